//! Validate command - check released charts and repository consistency

use console::style;

use chartkeeper_core::Paths;
use chartkeeper_repo::RepositoryConfig;
use chartkeeper_repo::validate::run_all;

use crate::error::{CliError, Result};

pub fn run(paths: &Paths) -> Result<()> {
    let config = RepositoryConfig::load(&paths.configuration_yaml)?;

    println!("{} Validating {}", style("→").blue(), paths.root.display());
    let errors = run_all(paths, &config);

    if errors.is_empty() {
        println!("{} Validation passed", style("✓").green());
        return Ok(());
    }

    for error in &errors {
        println!("  {} {}", style("✗").red(), error);
    }
    Err(CliError::validation_with_help(
        format!("{} problem(s) found", errors.len()),
        "Released chart versions must not change; publish a new version instead",
    ))
}
