//! Helm chart model
//!
//! A [`Chart`] is its `Chart.yaml` metadata plus every other file of the
//! chart as raw bytes. `Chart.yaml` itself is never kept in `files`: it is
//! regenerated from [`ChartMetadata`] whenever the chart is written.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Name of the metadata file at the root of every chart
pub const CHART_YAML: &str = "Chart.yaml";

/// Annotation keys owned by the Rancher catalog
pub mod annotations {
    /// Prefix shared by every catalog annotation
    pub const CATALOG_PREFIX: &str = "catalog.cattle.io";
    pub const AUTO_INSTALL: &str = "catalog.cattle.io/auto-install";
    pub const CERTIFIED: &str = "catalog.cattle.io/certified";
    pub const DISPLAY_NAME: &str = "catalog.cattle.io/display-name";
    pub const EXPERIMENTAL: &str = "catalog.cattle.io/experimental";
    pub const FEATURED: &str = "catalog.cattle.io/featured";
    pub const HIDDEN: &str = "catalog.cattle.io/hidden";
    pub const KUBE_VERSION: &str = "catalog.cattle.io/kube-version";
    pub const NAMESPACE: &str = "catalog.cattle.io/namespace";
    pub const RELEASE_NAME: &str = "catalog.cattle.io/release-name";

    /// Value of the certified annotation for partner charts
    pub const CERTIFIED_PARTNER: &str = "partner";
}

/// Contents of `Chart.yaml`
///
/// Every field is optional so the same type doubles as the metadata overlay
/// of `upstream.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Chart maintainer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Chart dependency as declared in `Chart.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Dependency {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_values: Vec<serde_yaml::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ChartMetadata {
    /// Parse `Chart.yaml` contents
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize to `Chart.yaml` contents
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Merge a metadata overlay into this metadata
    ///
    /// Non-empty scalars replace, lists are appended, `deprecated` is only
    /// ever switched on and annotations are merged key by key with the
    /// overlay winning.
    pub fn apply_overlay(&mut self, overlay: &ChartMetadata) {
        fn replace(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
                *target = Some(v.clone());
            }
        }

        if !overlay.name.is_empty() {
            self.name = overlay.name.clone();
        }
        if !overlay.version.is_empty() {
            self.version = overlay.version.clone();
        }
        replace(&mut self.home, &overlay.home);
        replace(&mut self.description, &overlay.description);
        replace(&mut self.icon, &overlay.icon);
        replace(&mut self.api_version, &overlay.api_version);
        replace(&mut self.condition, &overlay.condition);
        replace(&mut self.tags, &overlay.tags);
        replace(&mut self.app_version, &overlay.app_version);
        replace(&mut self.kube_version, &overlay.kube_version);
        replace(&mut self.chart_type, &overlay.chart_type);

        self.sources.extend(overlay.sources.iter().cloned());
        self.keywords.extend(overlay.keywords.iter().cloned());
        self.maintainers.extend(overlay.maintainers.iter().cloned());
        self.dependencies.extend(overlay.dependencies.iter().cloned());

        if overlay.deprecated {
            self.deprecated = true;
        }

        for (key, value) in &overlay.annotations {
            self.annotations.insert(key.clone(), value.clone());
        }
    }
}

/// A file of a chart, path relative to the chart root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// A loaded Helm chart
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub metadata: ChartMetadata,
    /// All files except `Chart.yaml`, sorted by path
    pub files: Vec<ChartFile>,
}

impl Chart {
    pub fn new(metadata: ChartMetadata) -> Self {
        Self {
            metadata,
            files: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Get a file by its path relative to the chart root
    pub fn file(&self, name: &str) -> Option<&ChartFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Replace the file with this path, or add it when absent
    pub fn put_file(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        match self.files.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.data = data,
            None => self.files.push(ChartFile { name, data }),
        }
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }

    /// Set an annotation
    ///
    /// An absent key is always written. A present key with a different value
    /// is only replaced when `replace` is set. Returns whether the chart
    /// changed.
    pub fn annotate(&mut self, key: &str, value: &str, replace: bool) -> bool {
        match self.metadata.annotations.get(key) {
            Some(current) if current == value => false,
            Some(_) if !replace => false,
            _ => {
                tracing::debug!(
                    "Adding annotation '{}: {}' to {} ({})",
                    key,
                    value,
                    self.metadata.name,
                    self.metadata.version
                );
                self.metadata
                    .annotations
                    .insert(key.to_string(), value.to_string());
                true
            }
        }
    }

    /// Remove an annotation
    ///
    /// With `value` set, the annotation is only removed when it carries that
    /// value. Returns whether the chart changed.
    pub fn deannotate(&mut self, key: &str, value: Option<&str>) -> bool {
        let matches = match (self.metadata.annotations.get(key), value) {
            (None, _) => false,
            (Some(current), Some(expected)) => current == expected,
            (Some(_), None) => true,
        };
        if matches {
            tracing::debug!(
                "Removing annotation '{}' from {} ({})",
                key,
                self.metadata.name,
                self.metadata.version
            );
            self.metadata.annotations.remove(key);
        }
        matches
    }

    /// Drop every annotation whose key starts with `prefix`
    pub fn strip_annotations_with_prefix(&mut self, prefix: &str) {
        self.metadata
            .annotations
            .retain(|key, _| !key.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart(annotations: &[(&str, &str)]) -> Chart {
        let mut metadata = ChartMetadata {
            name: "nginx".to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        };
        for (k, v) in annotations {
            metadata.annotations.insert(k.to_string(), v.to_string());
        }
        Chart::new(metadata)
    }

    #[test]
    fn test_parse_chart_yaml() {
        let yaml = r#"
apiVersion: v2
name: nginx
version: 15.4.2
appVersion: "1.25.3"
kubeVersion: ">=1.23-0"
type: application
annotations:
  category: Infrastructure
dependencies:
  - name: common
    version: 2.x.x
    repository: oci://registry-1.docker.io/bitnamicharts
    tags:
      - bitnami-common
"#;
        let metadata = ChartMetadata::from_yaml(yaml).unwrap();
        assert_eq!(metadata.name, "nginx");
        assert_eq!(metadata.version, "15.4.2");
        assert_eq!(metadata.kube_version.as_deref(), Some(">=1.23-0"));
        assert_eq!(metadata.chart_type.as_deref(), Some("application"));
        assert_eq!(metadata.dependencies.len(), 1);
        assert_eq!(metadata.dependencies[0].tags, vec!["bitnami-common"]);
        assert_eq!(
            metadata.annotations.get("category").map(String::as_str),
            Some("Infrastructure")
        );
    }

    #[test]
    fn test_chart_yaml_omits_empty_fields() {
        let metadata = ChartMetadata {
            api_version: Some("v2".to_string()),
            name: "nginx".to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        };
        let yaml = metadata.to_yaml().unwrap();
        assert!(yaml.contains("apiVersion: v2"));
        assert!(!yaml.contains("deprecated"));
        assert!(!yaml.contains("annotations"));
    }

    #[test]
    fn test_apply_overlay() {
        let mut metadata = ChartMetadata {
            name: "nginx".to_string(),
            version: "1.0.0".to_string(),
            description: Some("upstream".to_string()),
            keywords: vec!["web".to_string()],
            ..Default::default()
        };
        metadata
            .annotations
            .insert("a".to_string(), "upstream".to_string());

        let mut overlay = ChartMetadata {
            description: Some("patched".to_string()),
            home: Some(String::new()),
            keywords: vec!["proxy".to_string()],
            deprecated: true,
            kube_version: Some(">=1.25".to_string()),
            ..Default::default()
        };
        overlay
            .annotations
            .insert("a".to_string(), "overlay".to_string());

        metadata.apply_overlay(&overlay);

        assert_eq!(metadata.name, "nginx");
        assert_eq!(metadata.description.as_deref(), Some("patched"));
        assert_eq!(metadata.home, None);
        assert_eq!(metadata.keywords, vec!["web", "proxy"]);
        assert!(metadata.deprecated);
        assert_eq!(metadata.kube_version.as_deref(), Some(">=1.25"));
        assert_eq!(metadata.annotations["a"], "overlay");
    }

    #[test]
    fn test_annotate_without_replace() {
        let mut c = chart(&[("k", "old")]);
        assert!(!c.annotate("k", "new", false));
        assert_eq!(c.annotation("k"), Some("old"));
        assert!(c.annotate("other", "v", false));
        assert!(!c.annotate("other", "v", false));
    }

    #[test]
    fn test_annotate_with_replace() {
        let mut c = chart(&[("k", "old")]);
        assert!(c.annotate("k", "new", true));
        assert_eq!(c.annotation("k"), Some("new"));
        assert!(!c.annotate("k", "new", true));
    }

    #[test]
    fn test_deannotate() {
        let mut c = chart(&[("k", "1"), ("j", "2")]);
        assert!(!c.deannotate("k", Some("2")));
        assert!(c.deannotate("k", Some("1")));
        assert!(c.deannotate("j", None));
        assert!(!c.deannotate("missing", None));
        assert!(c.metadata.annotations.is_empty());
    }

    #[test]
    fn test_put_file() {
        let mut c = chart(&[]);
        c.put_file("values.yaml", b"a: 1".to_vec());
        c.put_file("values.yaml", b"a: 2".to_vec());
        c.put_file("README.md", b"hi".to_vec());
        assert_eq!(c.files.len(), 2);
        assert_eq!(c.file("values.yaml").unwrap().data, b"a: 2");
    }

    #[test]
    fn test_strip_catalog_annotations() {
        let mut c = chart(&[
            ("catalog.cattle.io/featured", "1"),
            ("catalog.cattle.io.extra", "x"),
            ("category", "db"),
        ]);
        c.strip_annotations_with_prefix(annotations::CATALOG_PREFIX);
        assert_eq!(c.metadata.annotations.len(), 1);
        assert_eq!(c.annotation("category"), Some("db"));
    }
}
