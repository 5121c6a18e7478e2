//! Package definitions
//!
//! A package lives at `packages/<vendor>/<name>/` and consists of an
//! `upstream.yaml` describing where its chart comes from and how it is
//! tracked, plus an optional `overlay/` tree of files copied over every
//! fetched chart.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

use crate::chart::ChartMetadata;
use crate::error::{CoreError, Result};
use crate::paths::Paths;
use crate::version::{MAX_PACKAGE_VERSION, TrackedStream};

pub const UPSTREAM_YAML: &str = "upstream.yaml";
pub const OVERLAY_DIR: &str = "overlay";

/// Which upstream versions are fetched on each run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum FetchMode {
    /// Only the newest upstream version
    #[default]
    Latest,
    /// Every upstream version newer than the newest stored one
    Newer,
    /// Every upstream version not yet stored
    All,
}

impl FromStr for FetchMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "latest" => Ok(FetchMode::Latest),
            "newer" => Ok(FetchMode::Newer),
            "all" => Ok(FetchMode::All),
            _ => Err(CoreError::UnknownFetchMode {
                mode: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for FetchMode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Latest => write!(f, "latest"),
            FetchMode::Newer => write!(f, "newer"),
            FetchMode::All => write!(f, "all"),
        }
    }
}

/// Contents of a package's `upstream.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpstreamYaml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_hub_package: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_hub_repo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_install: Option<String>,

    /// Metadata overlaid onto every fetched chart
    #[serde(default, skip_serializing_if = "is_default_metadata")]
    pub chart_metadata: ChartMetadata,

    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub experimental: bool,

    #[serde(default)]
    pub fetch: FetchMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,

    #[serde(default, rename = "GitHubRelease", skip_serializing_if = "is_false")]
    pub github_release: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_subdirectory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm_chart: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm_repo: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,

    /// Overrides every other source of the kube-version annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub package_version: u64,

    #[serde(default, skip_serializing_if = "is_false")]
    pub remote_dependencies: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub track_versions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn is_default_metadata(value: &ChartMetadata) -> bool {
    *value == ChartMetadata::default()
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl UpstreamYaml {
    /// Parse, apply defaults and validate
    pub fn from_yaml(yaml: &str, path: &Path) -> Result<Self> {
        let mut upstream: UpstreamYaml =
            serde_yaml::from_str(yaml).map_err(|e| CoreError::InvalidUpstream {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        upstream.set_defaults();
        upstream.validate().map_err(|message| CoreError::InvalidUpstream {
            path: path.display().to_string(),
            message,
        })?;
        Ok(upstream)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents, path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    fn set_defaults(&mut self) {
        if !is_set(&self.release_name) && is_set(&self.helm_chart) {
            self.release_name = self.helm_chart.clone();
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let helm_chart = is_set(&self.helm_chart);
        let helm_repo = is_set(&self.helm_repo);
        let hub_package = is_set(&self.artifact_hub_package);
        let hub_repo = is_set(&self.artifact_hub_repo);
        let git_repo = is_set(&self.git_repo);

        let rules = [
            (
                self.fetch != FetchMode::Latest && !helm_chart,
                "Fetch is not latest but HelmChart is not set",
            ),
            (
                self.fetch != FetchMode::Latest && !helm_repo,
                "Fetch is not latest but HelmRepo is not set",
            ),
            (
                !self.track_versions.is_empty() && !helm_chart,
                "TrackVersions is set but HelmChart is not set",
            ),
            (
                !self.track_versions.is_empty() && !helm_repo,
                "TrackVersions is set but HelmRepo is not set",
            ),
            (
                hub_package && !hub_repo,
                "ArtifactHubPackage is set but ArtifactHubRepo is not set",
            ),
            (
                hub_repo && !hub_package,
                "ArtifactHubRepo is set but ArtifactHubPackage is not set",
            ),
            (
                is_set(&self.git_branch) && !git_repo,
                "GitBranch is set but GitRepo is not set",
            ),
            (
                self.github_release && !git_repo,
                "GitHubRelease is set but GitRepo is not set",
            ),
            (
                is_set(&self.git_subdirectory) && !git_repo,
                "GitSubdirectory is set but GitRepo is not set",
            ),
            (
                helm_chart && !helm_repo,
                "HelmChart is set but HelmRepo is not set",
            ),
            (
                helm_repo && !helm_chart,
                "HelmRepo is set but HelmChart is not set",
            ),
            (
                !(hub_package && hub_repo || git_repo || helm_repo && helm_chart),
                "must define upstream",
            ),
        ];

        if let Some((_, message)) = rules.iter().find(|(violated, _)| *violated) {
            return Err(message.to_string());
        }

        if self.package_version > MAX_PACKAGE_VERSION {
            return Err(format!(
                "PackageVersion {} is greater than maximum of {}",
                self.package_version, MAX_PACKAGE_VERSION
            ));
        }

        for stream in &self.track_versions {
            TrackedStream::parse(stream)
                .map_err(|e| format!("invalid TrackVersions entry {:?}: {}", stream, e))?;
        }

        Ok(())
    }

    /// Tracked streams in configured order
    pub fn tracked_streams(&self) -> Result<Vec<TrackedStream>> {
        self.track_versions
            .iter()
            .map(|s| TrackedStream::parse(s))
            .collect()
    }
}

/// A package of the repository
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    /// Directory name, also the chart name in the repository
    pub name: String,
    /// Vendor directory name
    pub vendor: String,
    pub display_vendor: String,
    pub display_name: String,
    pub path: PathBuf,
    pub upstream: UpstreamYaml,
}

impl Package {
    /// Load the package at `packages/<vendor>/<name>`
    pub fn load(path: &Path) -> Result<Self> {
        let (vendor, name) = match (
            path.parent().and_then(Path::file_name),
            path.file_name(),
        ) {
            (Some(vendor), Some(name)) => (
                vendor.to_string_lossy().into_owned(),
                name.to_string_lossy().into_owned(),
            ),
            _ => {
                return Err(CoreError::InvalidUpstream {
                    path: path.display().to_string(),
                    message: "package path must be <vendor>/<name>".to_string(),
                });
            }
        };

        let upstream = UpstreamYaml::load(&path.join(UPSTREAM_YAML))?;

        let display_vendor = upstream
            .vendor
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vendor.clone());
        let display_name = upstream
            .display_name
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| name.clone());

        Ok(Self {
            name,
            vendor,
            display_vendor,
            display_name,
            path: path.to_path_buf(),
            upstream,
        })
    }

    /// `<vendor>/<name>`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.vendor, self.name)
    }

    /// Release name annotation value
    pub fn release_name(&self) -> &str {
        self.upstream
            .release_name
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.name)
    }

    /// Overlay files keyed by their path relative to the chart root
    pub fn overlay_files(&self) -> Result<BTreeMap<String, Vec<u8>>> {
        let overlay_dir = self.path.join(OVERLAY_DIR);
        let mut files = BTreeMap::new();
        if !overlay_dir.is_dir() {
            return Ok(files);
        }

        for entry in WalkDir::new(&overlay_dir) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&overlay_dir)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(relative, std::fs::read(entry.path())?);
        }

        Ok(files)
    }
}

/// List packages, sorted by vendor then name
///
/// With `only` set to `<vendor>/<name>`, exactly that package is returned.
pub fn list_packages(paths: &Paths, only: Option<&str>) -> Result<Vec<Package>> {
    if let Some(full_name) = only {
        let path = paths.packages.join(full_name);
        if !path.join(UPSTREAM_YAML).is_file() {
            return Err(CoreError::InvalidUpstream {
                path: path.display().to_string(),
                message: format!("failed to find package {:?}", full_name),
            });
        }
        return Ok(vec![Package::load(&path)?]);
    }

    let mut packages = Vec::new();
    if !paths.packages.is_dir() {
        return Ok(packages);
    }

    for entry in WalkDir::new(&paths.packages)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        packages.push(Package::load(entry.path())?);
    }

    packages.sort_by(|a, b| a.vendor.cmp(&b.vendor).then_with(|| a.name.cmp(&b.name)));
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(yaml: &str) -> Result<UpstreamYaml> {
        UpstreamYaml::from_yaml(yaml, Path::new("upstream.yaml"))
    }

    fn write_package(root: &Path, vendor: &str, name: &str, yaml: &str) -> PathBuf {
        let dir = root.join("packages").join(vendor).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(UPSTREAM_YAML), yaml).unwrap();
        dir
    }

    #[test]
    fn test_parse_helm_upstream() {
        let upstream = parse(
            r#"
HelmRepo: https://charts.example.com
HelmChart: app
Fetch: Newer
TrackVersions:
  - "1.4"
  - "2.0"
PackageVersion: 2
GitHubRelease: false
ChartMetadata:
  kubeVersion: ">=1.25-0"
  annotations:
    catalog.cattle.io/featured: "2"
"#,
        )
        .unwrap();

        assert_eq!(upstream.fetch, FetchMode::Newer);
        assert_eq!(upstream.release_name.as_deref(), Some("app"));
        assert_eq!(upstream.package_version, 2);
        assert_eq!(
            upstream.chart_metadata.kube_version.as_deref(),
            Some(">=1.25-0")
        );
        let streams = upstream.tracked_streams().unwrap();
        assert_eq!(streams[0], TrackedStream { major: 1, minor: 4 });
        assert_eq!(streams[1], TrackedStream { major: 2, minor: 0 });
    }

    #[test]
    fn test_fetch_defaults_to_latest() {
        let upstream = parse("GitRepo: https://github.com/acme/charts\n").unwrap();
        assert_eq!(upstream.fetch, FetchMode::Latest);
        assert_eq!(upstream.release_name, None);
    }

    #[test]
    fn test_validation_rules() {
        let cases = [
            ("HelmRepo: https://x\n", "HelmRepo is set but HelmChart"),
            ("ArtifactHubRepo: x\n", "ArtifactHubRepo is set"),
            (
                "GitRepo: https://x\nFetch: all\n",
                "Fetch is not latest but HelmChart",
            ),
            ("GitBranch: main\n", "GitBranch is set but GitRepo"),
            ("Namespace: x\n", "must define upstream"),
            (
                "GitRepo: https://x\nPackageVersion: 100\n",
                "PackageVersion 100",
            ),
        ];
        for (yaml, expected) in cases {
            let err = parse(yaml).unwrap_err().to_string();
            assert!(err.contains(expected), "{}: {}", yaml, err);
        }
    }

    #[test]
    fn test_unknown_fetch_mode() {
        assert!(parse("GitRepo: https://x\nFetch: sometimes\n").is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(UPSTREAM_YAML);
        let mut upstream = parse("HelmRepo: https://x\nHelmChart: app\n").unwrap();
        upstream.hidden = true;
        upstream.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Hidden: true"));
        assert!(!text.contains("GitHubRelease"));
        assert_eq!(UpstreamYaml::load(&path).unwrap(), upstream);
    }

    #[test]
    fn test_list_packages_sorted() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path());
        write_package(temp.path(), "zeta", "app", "GitRepo: https://x\n");
        write_package(
            temp.path(),
            "acme",
            "web",
            "GitRepo: https://x\nVendor: Acme Corp\nDisplayName: Acme Web\n",
        );
        write_package(temp.path(), "acme", "api", "GitRepo: https://x\n");

        let packages = list_packages(&paths, None).unwrap();
        let names: Vec<_> = packages.iter().map(Package::full_name).collect();
        assert_eq!(names, vec!["acme/api", "acme/web", "zeta/app"]);
        assert_eq!(packages[1].display_vendor, "Acme Corp");
        assert_eq!(packages[1].display_name, "Acme Web");
        assert_eq!(packages[0].display_name, "api");
        assert_eq!(packages[0].release_name(), "api");
    }

    #[test]
    fn test_list_single_package() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path());
        write_package(temp.path(), "acme", "web", "GitRepo: https://x\n");

        assert_eq!(list_packages(&paths, Some("acme/web")).unwrap().len(), 1);
        assert!(list_packages(&paths, Some("acme/missing")).is_err());
    }

    #[test]
    fn test_overlay_files() {
        let temp = TempDir::new().unwrap();
        let dir = write_package(temp.path(), "acme", "web", "GitRepo: https://x\n");
        std::fs::create_dir_all(dir.join("overlay/templates")).unwrap();
        std::fs::write(dir.join("overlay/app-readme.md"), "readme").unwrap();
        std::fs::write(dir.join("overlay/templates/extra.yaml"), "kind: X").unwrap();

        let package = Package::load(&dir).unwrap();
        let files = package.overlay_files().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files["app-readme.md"], b"readme");
        assert!(files.contains_key("templates/extra.yaml"));
    }
}
