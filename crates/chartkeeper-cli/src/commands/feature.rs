//! Feature commands - manage the featured slots of the Rancher UI

use console::style;

use chartkeeper_core::Paths;
use chartkeeper_repo::RepositoryIndex;
use chartkeeper_repo::maintain;

use crate::commands::load_package;
use crate::error::Result;

/// Print featured charts by slot
pub fn list(paths: &Paths) -> Result<()> {
    let index = RepositoryIndex::load_or_default(&paths.index_yaml)?;
    let featured = maintain::featured(&index)?;

    if featured.has_conflicts() {
        tracing::error!("Multiple charts given same featured index");
    }
    for (slot, names) in &featured.slots {
        println!("{}: {}", slot, names.join(", "));
    }
    Ok(())
}

pub fn add(paths: &Paths, full_name: &str, slot: u8) -> Result<()> {
    let package = load_package(paths, full_name)?;
    maintain::add_featured(paths, &package, slot)?;
    println!(
        "{} {} featured at index {}",
        style("✓").green(),
        style(full_name).bold(),
        slot
    );
    Ok(())
}

pub fn remove(paths: &Paths, full_name: &str) -> Result<()> {
    let package = load_package(paths, full_name)?;
    maintain::remove_featured(paths, &package)?;
    println!("{} {} is no longer featured", style("✓").green(), style(full_name).bold());
    Ok(())
}
