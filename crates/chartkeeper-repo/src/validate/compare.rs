//! Content-aware directory comparison
//!
//! Files are compared by SHA-256. Chart archives that differ byte-wise are
//! unpacked and compared again with Rancher-specific metadata removed, so
//! that moving an annotation or deprecating a chart does not count as
//! modifying a released chart.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

use chartkeeper_core::{Chart, annotations};

use crate::error::Result;
use crate::index::file_digest;

/// Outcome of comparing a reference tree with a working tree
///
/// Paths are relative to the compared roots and every path appears in
/// exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryComparison {
    pub unchanged: Vec<String>,
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl DirectoryComparison {
    /// Whether nothing was modified, added or removed
    pub fn is_match(&self) -> bool {
        self.modified.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    pub fn merge(&mut self, other: DirectoryComparison) {
        self.unchanged.extend(other.unchanged);
        self.modified.extend(other.modified);
        self.added.extend(other.added);
        self.removed.extend(other.removed);
    }
}

/// Files below `root`, relative and `/`-separated, skipping entries named in `skip`
fn relative_files(root: &Path, skip: &[&str]) -> Result<Vec<(String, PathBuf)>> {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !skip.iter().any(|s| e.file_name().to_str() == Some(*s))
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        files.push((relative, entry.into_path()));
    }
    Ok(files)
}

/// Compare the `update` tree against the `upstream` reference tree
pub fn compare_directories(
    upstream: &Path,
    update: &Path,
    skip: &[&str],
) -> Result<DirectoryComparison> {
    tracing::debug!(
        "Comparing directories {} and {}",
        upstream.display(),
        update.display()
    );

    let mut comparison = DirectoryComparison::default();
    let mut checked = HashSet::new();

    for (relative, upstream_file) in relative_files(upstream, skip)? {
        let update_file = update.join(&relative);
        checked.insert(relative.clone());

        if !update_file.is_file() {
            comparison.removed.push(relative);
            continue;
        }

        if file_digest(&upstream_file)? == file_digest(&update_file)? {
            comparison.unchanged.push(relative);
            continue;
        }

        let chart_match = relative.ends_with(".tgz")
            && match_helm_charts(&upstream_file, &update_file).unwrap_or_else(|e| {
                tracing::debug!("failed to compare charts {}: {}", relative, e);
                false
            });
        if chart_match {
            comparison.unchanged.push(relative);
        } else {
            comparison.modified.push(relative);
        }
    }

    for (relative, _) in relative_files(update, skip)? {
        if !checked.contains(&relative) {
            comparison.added.push(relative);
        }
    }

    Ok(comparison)
}

/// Unpack a chart archive with Rancher-specific metadata neutralized
fn prepare_for_comparison(archive: &Path) -> Result<TempDir> {
    let mut chart = Chart::load_archive(archive)?;
    chart.strip_annotations_with_prefix(annotations::CATALOG_PREFIX);
    chart.metadata.deprecated = false;

    let dir = tempfile::Builder::new()
        .prefix("chartkeeper-validate-")
        .tempdir()?;
    chart.export_dir(dir.path())?;
    Ok(dir)
}

/// Whether two chart archives are equal apart from `catalog.cattle.io` annotations and `deprecated`
pub fn match_helm_charts(upstream: &Path, update: &Path) -> Result<bool> {
    let upstream_dir = prepare_for_comparison(upstream)?;
    let update_dir = prepare_for_comparison(update)?;
    let comparison = compare_directories(upstream_dir.path(), update_dir.path(), &[])?;
    Ok(comparison.is_match())
}
