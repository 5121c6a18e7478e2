//! List command - print the packages of the repository

use chartkeeper_core::{Paths, list_packages};

use crate::error::Result;

pub fn run(paths: &Paths, package: Option<&str>) -> Result<()> {
    for package in list_packages(paths, package)? {
        println!("{}", package.full_name());
    }
    Ok(())
}
