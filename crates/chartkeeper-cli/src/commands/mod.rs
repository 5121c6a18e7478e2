//! CLI commands

pub mod cull;
pub mod feature;
pub mod hide;
pub mod list;
pub mod stage;
pub mod validate;

use chartkeeper_core::{Package, Paths, list_packages};

use crate::error::{CliError, Result};

/// Load one package given as `<vendor>/<name>`
pub(crate) fn load_package(paths: &Paths, full_name: &str) -> Result<Package> {
    if full_name.split('/').filter(|p| !p.is_empty()).count() != 2 {
        return Err(CliError::usage(format!(
            "package must be given as <vendor>/<name>, got {:?}",
            full_name
        )));
    }
    let mut packages = list_packages(paths, Some(full_name))?;
    packages
        .pop()
        .ok_or_else(|| CliError::usage(format!("package {:?} not available", full_name)))
}
