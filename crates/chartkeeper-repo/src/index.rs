//! Repository index types
//!
//! Helm-compatible `index.yaml`. The same types are used for upstream Helm
//! repositories and for the index this tool writes for its own repository.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

use chartkeeper_core::{Chart, ChartMetadata, parse_lenient};

use crate::error::{RepoError, Result};

/// Repository index (Helm-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// When this index was generated
    #[serde(default = "Utc::now")]
    pub generated: DateTime<Utc>,

    /// Chart versions indexed by chart name
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ChartEntry>>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Default for RepositoryIndex {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            generated: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

/// One chart version of an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartEntry {
    #[serde(flatten)]
    pub metadata: ChartMetadata,

    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,

    /// Hex SHA-256 of the archive
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub removed: bool,
}

impl ChartEntry {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Get the primary download URL
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(|s| s.as_str())
    }

    /// Parse version as (lenient) semver
    pub fn parsed_version(&self) -> Option<Version> {
        parse_lenient(&self.metadata.version).ok()
    }
}

/// Newest first; unparsable versions sort last
pub fn compare_descending(a: &ChartEntry, b: &ChartEntry) -> Ordering {
    match (a.parsed_version(), b.parsed_version()) {
        (Some(va), Some(vb)) => vb.cmp(&va),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.version().cmp(a.version()),
    }
}

impl RepositoryIndex {
    /// Parse index from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RepoError::IndexParseError {
            message: e.to_string(),
        })
    }

    /// Parse index from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes).map_err(|e| RepoError::IndexParseError {
            message: format!("Invalid UTF-8: {}", e),
        })?;
        Self::from_yaml(yaml)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    /// Load the index, or an empty one when the file does not exist yet
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Get all versions of a chart
    pub fn get(&self, name: &str) -> Option<&Vec<ChartEntry>> {
        self.entries.get(name)
    }

    /// Get a specific version of a chart
    pub fn get_version(&self, name: &str, version: &str) -> Option<&ChartEntry> {
        self.entries
            .get(name)
            .and_then(|versions| versions.iter().find(|e| e.version() == version))
    }

    /// Sort every entry list newest first
    pub fn sort_entries(&mut self) {
        for versions in self.entries.values_mut() {
            versions.sort_by(compare_descending);
        }
    }

    /// Drop one version of a chart
    pub fn remove_version(&mut self, name: &str, version: &str) -> Result<()> {
        let versions = self.entries.get_mut(name).ok_or_else(|| RepoError::NotInIndex {
            name: name.to_string(),
        })?;
        let before = versions.len();
        versions.retain(|e| e.version() != version);
        if versions.len() == before {
            return Err(RepoError::Other(format!(
                "version {} not found for chart {} in index",
                version, name
            )));
        }
        Ok(())
    }

    /// Chart versions carrying `annotation`, optionally with a specific value
    pub fn by_annotation(
        &self,
        annotation: &str,
        value: Option<&str>,
    ) -> BTreeMap<String, Vec<&ChartEntry>> {
        let mut matched: BTreeMap<String, Vec<&ChartEntry>> = BTreeMap::new();
        for (name, versions) in &self.entries {
            for entry in versions {
                let hit = match (entry.metadata.annotations.get(annotation), value) {
                    (Some(current), Some(expected)) => current == expected,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if hit {
                    matched.entry(name.clone()).or_default().push(entry);
                }
            }
        }
        matched
    }

    /// Build an index from the `.tgz` charts found one or two levels below `dir`
    ///
    /// URLs are `<base>/<path relative to dir>`.
    pub fn index_directory(dir: &Path, base: &str) -> Result<Self> {
        let mut index = Self::default();
        if !dir.is_dir() {
            return Ok(index);
        }

        for entry in WalkDir::new(dir).max_depth(2).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "tgz") {
                continue;
            }

            let chart = Chart::load_archive(path)?;
            let relative = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let url = if base.is_empty() {
                relative
            } else {
                format!("{}/{}", base.trim_end_matches('/'), relative)
            };

            let chart_entry = ChartEntry {
                metadata: chart.metadata,
                urls: vec![url],
                created: Utc::now(),
                digest: file_digest(path)?,
                removed: false,
            };
            index
                .entries
                .entry(chart_entry.name().to_string())
                .or_default()
                .push(chart_entry);
        }

        index.sort_entries();
        Ok(index)
    }
}

/// Hex SHA-256 of a file
pub fn file_digest(path: &Path) -> Result<String> {
    let data = std::fs::read(path)?;
    Ok(compute_digest(&data))
}

/// Hex SHA-256 of data
pub fn compute_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_index() -> RepositoryIndex {
        RepositoryIndex::from_yaml(
            r#"
apiVersion: v1
entries:
  nginx:
    - name: nginx
      version: 1.2.0
      urls:
        - https://charts.example.com/nginx-1.2.0.tgz
      created: "2024-01-15T10:00:00Z"
      digest: abc123
      annotations:
        catalog.cattle.io/featured: "1"
    - name: nginx
      version: 1.10.0
      urls:
        - nginx-1.10.0.tgz
      created: "2024-02-15T10:00:00Z"
    - name: nginx
      version: 1.11.0-rc.1
      urls:
        - nginx-1.11.0-rc.1.tgz
  redis:
    - name: redis
      version: 7.0.0
      urls:
        - redis-7.0.0.tgz
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_index() {
        let index = sample_index();
        assert_eq!(index.entries.len(), 2);
        let entry = index.get_version("nginx", "1.2.0").unwrap();
        assert_eq!(entry.digest, "abc123");
        assert_eq!(entry.download_url(), Some("https://charts.example.com/nginx-1.2.0.tgz"));
    }

    #[test]
    fn test_sort_entries() {
        let mut index = sample_index();
        index.sort_entries();
        let versions: Vec<_> = index.get("nginx").unwrap().iter().map(|e| e.version()).collect();
        assert_eq!(versions, vec!["1.11.0-rc.1", "1.10.0", "1.2.0"]);
    }

    #[test]
    fn test_remove_version() {
        let mut index = sample_index();
        index.remove_version("nginx", "1.2.0").unwrap();
        assert!(index.get_version("nginx", "1.2.0").is_none());
        assert!(index.remove_version("nginx", "9.9.9").is_err());
        assert!(matches!(
            index.remove_version("missing", "1.0.0"),
            Err(RepoError::NotInIndex { .. })
        ));
    }

    #[test]
    fn test_by_annotation() {
        let index = sample_index();
        let featured = index.by_annotation("catalog.cattle.io/featured", None);
        assert_eq!(featured.len(), 1);
        assert_eq!(featured["nginx"].len(), 1);
        assert!(
            index
                .by_annotation("catalog.cattle.io/featured", Some("2"))
                .is_empty()
        );
    }

    #[test]
    fn test_index_directory() {
        let temp = TempDir::new().unwrap();
        let assets = temp.path().join("assets");
        for version in ["1.0.0", "1.1.0"] {
            let mut chart = Chart::new(ChartMetadata {
                name: "demo".to_string(),
                version: version.to_string(),
                ..Default::default()
            });
            chart.put_file("values.yaml", b"a: 1".to_vec());
            chart.save_archive(&assets.join("acme")).unwrap();
        }
        std::fs::create_dir_all(assets.join("icons")).unwrap();
        std::fs::write(assets.join("icons/demo.png"), b"png").unwrap();

        let index = RepositoryIndex::index_directory(&assets, "assets").unwrap();
        let versions = index.get("demo").unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version(), "1.1.0");
        assert_eq!(versions[0].urls, vec!["assets/acme/demo-1.1.0.tgz"]);
        assert_eq!(
            versions[0].digest,
            file_digest(&assets.join("acme/demo-1.1.0.tgz")).unwrap()
        );
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.yaml");
        let index = sample_index();
        index.save(&path).unwrap();

        let loaded = RepositoryIndex::load(&path).unwrap();
        assert_eq!(loaded.get("redis"), index.get("redis"));
    }

    #[test]
    fn test_compute_digest() {
        assert_eq!(
            compute_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
