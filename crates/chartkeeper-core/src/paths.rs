//! Repository layout

use std::path::{Path, PathBuf};

/// Locations of everything the tool reads or writes in a chart repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    /// Packaged `.tgz` charts, `assets/<vendor>/<name>-<version>.tgz`
    pub assets: PathBuf,
    /// Unpacked charts, `charts/<vendor>/<name>/<version>/`
    pub charts: PathBuf,
    pub configuration_yaml: PathBuf,
    pub icons: PathBuf,
    pub index_yaml: PathBuf,
    /// Package definitions, `packages/<vendor>/<name>/upstream.yaml`
    pub packages: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let assets = root.join("assets");
        Self {
            charts: root.join("charts"),
            configuration_yaml: root.join("configuration.yaml"),
            icons: assets.join("icons"),
            index_yaml: root.join("index.yaml"),
            packages: root.join("packages"),
            assets,
            root,
        }
    }

    pub fn vendor_assets(&self, vendor: &str) -> PathBuf {
        self.assets.join(vendor)
    }

    pub fn package_charts(&self, vendor: &str, name: &str) -> PathBuf {
        self.charts.join(vendor).join(name)
    }

    /// Path relative to the repository root, for logs and commit contents
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}
