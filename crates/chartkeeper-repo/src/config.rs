//! Repository configuration
//!
//! `configuration.yaml` sits at the repository root and holds settings that
//! apply to every package.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RepoError, Result};

/// Contents of `configuration.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// Released branches that published charts are checked against
    #[serde(default)]
    pub validate: Vec<ValidateUpstream>,

    /// Which new chart inherits the featured annotation
    #[serde(default)]
    pub featured_placement: FeaturedPlacement,
}

/// A released branch of the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateUpstream {
    pub url: String,
    pub branch: String,
}

/// Placement of the featured annotation among newly fetched charts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeaturedPlacement {
    /// The last chart in fetch order
    #[default]
    LastFetched,
    /// The chart with the highest version
    HighestVersion,
}

impl RepositoryConfig {
    /// Load the configuration, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RepoError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// The released branch to validate against
    pub fn validate_upstream(&self) -> Result<&ValidateUpstream> {
        let upstream = self.validate.first().ok_or_else(|| RepoError::InvalidConfig {
            message: "must provide validation configuration".to_string(),
        })?;
        if upstream.branch.is_empty() {
            return Err(RepoError::InvalidConfig {
                message: "must provide branch in validation configuration".to_string(),
            });
        }
        if upstream.url.is_empty() {
            return Err(RepoError::InvalidConfig {
                message: "must provide URL in validation configuration".to_string(),
            });
        }
        Ok(upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = RepositoryConfig::from_yaml(
            r#"
validate:
  - url: https://github.com/acme/charts
    branch: main
featuredPlacement: highest-version
"#,
        )
        .unwrap();

        assert_eq!(config.featured_placement, FeaturedPlacement::HighestVersion);
        let upstream = config.validate_upstream().unwrap();
        assert_eq!(upstream.branch, "main");
    }

    #[test]
    fn test_defaults() {
        let config = RepositoryConfig::from_yaml("validate: []\n").unwrap();
        assert_eq!(config.featured_placement, FeaturedPlacement::LastFetched);
        assert!(config.validate_upstream().is_err());

        let missing = RepositoryConfig::load(Path::new("/nonexistent/configuration.yaml")).unwrap();
        assert_eq!(missing, RepositoryConfig::default());
    }

    #[test]
    fn test_validate_requires_branch() {
        let config = RepositoryConfig::from_yaml(
            "validate:\n  - url: https://github.com/acme/charts\n    branch: \"\"\n",
        )
        .unwrap();
        let err = config.validate_upstream().unwrap_err();
        assert!(err.to_string().contains("branch"));
    }
}
