//! On-disk chart store
//!
//! Packaged charts live in `assets/<vendor>/<name>-<version>.tgz`, their
//! unpacked copies in `charts/<vendor>/<name>/<version>/`, and `index.yaml`
//! is always regenerated from `assets/`.

use std::path::Path;

use chartkeeper_core::{Chart, Package, Paths};

use crate::error::{RepoError, Result};
use crate::icons::IconStore;
use crate::index::RepositoryIndex;
use crate::integrate::TrackedChart;

/// URL prefix of charts in the generated index
const ASSETS_URL_BASE: &str = "assets";

/// Load the published charts of a package
///
/// Archives named `<name>-*.tgz` whose chart name differs (such as
/// `<name>-crd`) are not part of the package.
pub fn load_existing_charts(paths: &Paths, package: &Package) -> Result<Vec<TrackedChart>> {
    let assets = paths.vendor_assets(&package.vendor);
    if !assets.is_dir() {
        return Ok(Vec::new());
    }

    let prefix = format!("{}-", package.name);
    let mut files: Vec<_> = std::fs::read_dir(&assets)?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".tgz"))
        })
        .collect();
    files.sort();

    let mut charts = Vec::with_capacity(files.len());
    for file in files {
        let chart = Chart::load_archive(&file).map_err(|e| {
            let file_name = file.file_name().unwrap_or_default().to_string_lossy();
            RepoError::from(e).for_chart("load", &package.name, &file_name)
        })?;
        if chart.name() != package.name {
            tracing::debug!(
                "Skipping {} (chart {} belongs to another package)",
                paths.relative(&file).display(),
                chart.name()
            );
            continue;
        }
        charts.push(TrackedChart::new(chart));
    }

    Ok(charts)
}

/// Write a package's charts back to disk
///
/// The unpacked directory of the package is rebuilt from scratch; archives
/// are only rewritten for modified charts or when missing.
pub fn write_charts(paths: &Paths, package: &Package, charts: &[TrackedChart]) -> Result<()> {
    let charts_dir = paths.package_charts(&package.vendor, &package.name);
    let assets_dir = paths.vendor_assets(&package.vendor);

    if charts_dir.exists() {
        std::fs::remove_dir_all(&charts_dir)?;
    }

    for tracked in charts {
        let chart = tracked.chart();
        let archive = assets_dir.join(chart.archive_name());
        if tracked.is_modified() || !archive.is_file() {
            chart
                .save_archive(&assets_dir)
                .map_err(|e| RepoError::from(e).for_chart("write tgz for", chart.name(), chart.version()))?;
            tracing::debug!("Wrote {}", paths.relative(&archive).display());
        }

        let unpacked = charts_dir.join(chart.version());
        if tracked.is_modified() || !unpacked.exists() {
            export_archive(&archive, &unpacked)
                .map_err(|e| e.for_chart("unpack", chart.name(), chart.version()))?;
        }
    }

    Ok(())
}

/// Unpack the archive as written, so `charts/` always mirrors `assets/`
fn export_archive(archive: &Path, target: &Path) -> Result<()> {
    Chart::load_archive(archive)?.export_dir(target)?;
    Ok(())
}

/// Regenerate `index.yaml` from `assets/`
///
/// `created` timestamps of versions already in the index are preserved and
/// every icon points at the package's local icon. Older charts may still
/// carry remote icon URLs in their `Chart.yaml`; only their index entry is
/// rewritten.
pub fn write_index(paths: &Paths, icons: &IconStore) -> Result<()> {
    let mut index = RepositoryIndex::index_directory(&paths.assets, ASSETS_URL_BASE)?;

    if !paths.index_yaml.exists() {
        index.save(&paths.index_yaml)?;
        return Ok(());
    }
    let old = RepositoryIndex::load(&paths.index_yaml)?;

    for (name, versions) in index.entries.iter_mut() {
        for entry in versions.iter_mut() {
            if let Some(previous) = old.get_version(name, entry.version()) {
                entry.created = previous.created;
            }

            match icons.local_icon_path(entry.name()) {
                Ok(icon) => entry.metadata.icon = Some(icon),
                Err(e) => tracing::error!(
                    "failed to get downloaded icon path for chart {:?} version {:?}: {}",
                    entry.name(),
                    entry.version(),
                    e
                ),
            }
        }
    }

    index.sort_entries();
    index.save(&paths.index_yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartkeeper_core::{ChartMetadata, UpstreamYaml, annotations};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn package() -> Package {
        Package {
            name: "app".to_string(),
            vendor: "acme".to_string(),
            display_vendor: "acme".to_string(),
            display_name: "app".to_string(),
            path: PathBuf::from("packages/acme/app"),
            upstream: UpstreamYaml::default(),
        }
    }

    fn chart(name: &str, version: &str) -> Chart {
        let mut chart = Chart::new(ChartMetadata {
            api_version: Some("v2".to_string()),
            name: name.to_string(),
            version: version.to_string(),
            icon: Some("https://example.com/icon.png".to_string()),
            ..Default::default()
        });
        chart.put_file("values.yaml", b"a: 1\n".to_vec());
        chart
    }

    #[test]
    fn test_load_existing_charts_filters_by_name() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path());
        let assets = paths.vendor_assets("acme");
        chart("app", "1.0.0").save_archive(&assets).unwrap();
        chart("app", "1.1.0").save_archive(&assets).unwrap();
        chart("app-crd", "1.0.0").save_archive(&assets).unwrap();
        chart("other", "1.0.0").save_archive(&assets).unwrap();

        let existing = load_existing_charts(&paths, &package()).unwrap();
        let versions: Vec<_> = existing.iter().map(|c| c.chart().version()).collect();
        assert_eq!(versions, vec!["1.0.0", "1.1.0"]);
        assert!(existing.iter().all(|c| !c.is_modified()));
    }

    #[test]
    fn test_load_existing_charts_without_assets() {
        let temp = TempDir::new().unwrap();
        let existing = load_existing_charts(&Paths::new(temp.path()), &package()).unwrap();
        assert!(existing.is_empty());
    }

    #[test]
    fn test_write_charts_only_rewrites_modified() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path());
        let assets = paths.vendor_assets("acme");
        chart("app", "1.0.0").save_archive(&assets).unwrap();

        let stale = paths.package_charts("acme", "app").join("0.1.0");
        std::fs::create_dir_all(&stale).unwrap();

        // in-memory copy differs from the archive but is not marked modified
        let mut in_memory = chart("app", "1.0.0");
        in_memory.annotate(annotations::HIDDEN, "true", false);
        let existing = TrackedChart::new(in_memory);

        let mut new = TrackedChart::new(chart("app", "1.1.0"));
        new.annotate(annotations::CERTIFIED, "partner", false);
        assert!(new.is_modified());

        write_charts(&paths, &package(), &[existing, new]).unwrap();

        assert!(!stale.exists());
        let published = Chart::load_archive(&assets.join("app-1.0.0.tgz")).unwrap();
        assert_eq!(published.annotation(annotations::HIDDEN), None);
        let unpacked = paths.package_charts("acme", "app");
        assert!(unpacked.join("1.0.0/values.yaml").is_file());

        let written = Chart::load_archive(&assets.join("app-1.1.0.tgz")).unwrap();
        assert_eq!(written.annotation(annotations::CERTIFIED), Some("partner"));
        let exported = Chart::load_dir(&unpacked.join("1.1.0")).unwrap();
        assert_eq!(exported.annotation(annotations::CERTIFIED), Some("partner"));
    }

    #[test]
    fn test_write_index_preserves_created_and_sets_icons() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path());
        let icons = IconStore::new(paths.clone());
        let assets = paths.vendor_assets("acme");
        chart("app", "1.0.0").save_archive(&assets).unwrap();

        write_index(&paths, &icons).unwrap();
        let first = RepositoryIndex::load(&paths.index_yaml).unwrap();
        let created = first.get_version("app", "1.0.0").unwrap().created;

        std::fs::create_dir_all(&paths.icons).unwrap();
        std::fs::write(paths.icons.join("app.svg"), b"<svg/>").unwrap();
        chart("app", "1.1.0").save_archive(&assets).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        write_index(&paths, &icons).unwrap();

        let index = RepositoryIndex::load(&paths.index_yaml).unwrap();
        let versions = index.get("app").unwrap();
        assert_eq!(versions[0].version(), "1.1.0");
        assert_eq!(versions[1].created, created);
        assert_eq!(versions[0].urls, vec!["assets/acme/app-1.1.0.tgz"]);
        assert!(
            versions
                .iter()
                .all(|v| v.metadata.icon.as_deref() == Some("file://assets/icons/app.svg"))
        );
    }
}
