//! Stage and auto commands - bring packages up to date, optionally committing

use console::style;

use chartkeeper_core::Paths;
use chartkeeper_repo::{Reconciler, RepositoryConfig};

use crate::error::Result;

/// Run one reconciliation, committing the result when `commit` is set
pub fn run(paths: &Paths, package: Option<&str>, commit: bool) -> Result<()> {
    let config = RepositoryConfig::load(&paths.configuration_yaml)?;
    let reconciler = Reconciler::new(paths.clone(), config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(reconciler.stage(package))?;

    if report.applied.is_empty() {
        println!("{} Everything is up to date", style("✓").green());
        return Ok(());
    }

    for update in &report.applied {
        let versions: Vec<&str> = update.fetch.iter().map(|e| e.version()).collect();
        println!(
            "{} {} {}",
            style("✓").green(),
            style(update.package.full_name()).bold(),
            versions.join(", ")
        );
    }
    for name in &report.skipped {
        println!("{} {} skipped", style("✗").red(), style(name).bold());
    }

    if commit && let Some(sha) = reconciler.commit(&report)? {
        println!("{} Committed {}", style("→").blue(), sha);
    }

    Ok(())
}
