//! Hide command - hide packages in the Rancher UI

use console::style;

use chartkeeper_core::Paths;
use chartkeeper_repo::maintain;

use crate::commands::load_package;
use crate::error::Result;

pub fn run(paths: &Paths, packages: &[String]) -> Result<()> {
    for full_name in packages {
        let package = load_package(paths, full_name)?;
        if maintain::hide(paths, &package)? {
            println!("{} {} hidden", style("✓").green(), style(full_name).bold());
        } else {
            println!("{} {} was already hidden", style("→").blue(), full_name);
        }
    }
    Ok(())
}
