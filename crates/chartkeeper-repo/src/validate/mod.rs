//! Release validation
//!
//! Proves that charts published on the released branch were not altered by
//! the working copy, apart from Rancher-specific metadata, and runs the
//! structural repository checks.

mod checks;
mod compare;

pub use checks::{
    duplicate_package_names, icons_referenced, index_and_packages_names_match,
    packages_directory_layout,
};
pub use compare::{DirectoryComparison, compare_directories, match_helm_charts};

use std::path::Path;

use chartkeeper_core::Paths;

use crate::config::RepositoryConfig;
use crate::error::{RepoError, Result};
use crate::vcs;

/// Directories of a released branch whose contents must not change
const RELEASED_DIRS: [&str; 1] = ["assets"];

/// Files allowed to differ inside released directories
const SKIPPED_FILES: [&str; 1] = ["README.md"];

/// A check of the repository, returning every problem found
pub type Check = fn(&Paths, &RepositoryConfig) -> Vec<RepoError>;

/// Every check `validate` runs, in order
pub const CHECKS: [(&str, Check); 5] = [
    ("released chart modifications", prevent_released_chart_modifications),
    ("duplicate package names", duplicate_package_names),
    ("index.yaml and packages/ names", index_and_packages_names_match),
    ("icons", icons_referenced),
    ("packages/ layout", packages_directory_layout),
];

/// Run all checks and collect their problems
pub fn run_all(paths: &Paths, config: &RepositoryConfig) -> Vec<RepoError> {
    let mut errors = Vec::new();
    for (name, check) in CHECKS {
        tracing::debug!("Running check: {}", name);
        let found = check(paths, config);
        if !found.is_empty() {
            tracing::debug!("Check {} found {} problem(s)", name, found.len());
        }
        errors.extend(found);
    }
    errors
}

/// Compare the released directories of `reference_root` with the working copy
///
/// Directories missing on either side are skipped.
pub fn released_modifications(paths: &Paths, reference_root: &Path) -> Result<DirectoryComparison> {
    let mut comparison = DirectoryComparison::default();

    for dir in RELEASED_DIRS {
        let upstream = reference_root.join(dir);
        let update = paths.root.join(dir);
        if !update.is_dir() {
            tracing::info!("Directory '{}' not in source. Skipping...", dir);
            continue;
        }
        if !upstream.is_dir() {
            tracing::info!("Directory '{}' not in upstream. Skipping...", dir);
            continue;
        }
        comparison.merge(compare_directories(&upstream, &update, &SKIPPED_FILES)?);
    }

    for added in &comparison.added {
        tracing::info!("{} was added", added);
    }
    for removed in &comparison.removed {
        tracing::warn!("{} was removed", removed);
    }
    Ok(comparison)
}

/// Fail for every released chart the working copy modified
///
/// The configured `validate` branch is cloned into a temporary directory and
/// compared against `assets/`.
pub fn prevent_released_chart_modifications(
    paths: &Paths,
    config: &RepositoryConfig,
) -> Vec<RepoError> {
    match released_chart_modifications(paths, config) {
        Ok(comparison) => comparison
            .modified
            .into_iter()
            .map(|file| RepoError::Validation {
                message: format!("{} was modified", file),
            })
            .collect(),
        Err(e) => vec![e],
    }
}

fn released_chart_modifications(
    paths: &Paths,
    config: &RepositoryConfig,
) -> Result<DirectoryComparison> {
    let upstream = config.validate_upstream()?;
    let clone_dir = tempfile::Builder::new()
        .prefix("chartkeeper-released-")
        .tempdir()?;

    tracing::info!("Comparing against {} ({})", upstream.url, upstream.branch);
    vcs::shallow_clone(&upstream.url, &upstream.branch, clone_dir.path())?;
    released_modifications(paths, clone_dir.path())
}
