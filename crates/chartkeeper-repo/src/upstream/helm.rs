//! Helm repository upstream

use async_trait::async_trait;
use regex::Regex;

use super::{SourceKind, SourceMetadata, Upstream};
use crate::error::{RepoError, Result};
use crate::http::HttpClient;
use crate::index::{RepositoryIndex, compare_descending};

/// A chart served from a Helm repository's `index.yaml`
#[derive(Debug, Clone)]
pub struct HelmRepoUpstream {
    client: HttpClient,
    repo: String,
    chart: String,
}

impl HelmRepoUpstream {
    pub fn new(client: HttpClient, repo: impl Into<String>, chart: impl Into<String>) -> Self {
        Self {
            client,
            repo: repo.into().trim_end_matches('/').to_string(),
            chart: chart.into(),
        }
    }

    pub(crate) async fn fetch_versions(&self, kind: SourceKind) -> Result<SourceMetadata> {
        let url = format!("{}/index.yaml", self.repo);
        let scheme = Regex::new("^https?://").map_err(|e| RepoError::Other(e.to_string()))?;
        if !scheme.is_match(&url) {
            return Err(RepoError::InvalidUrl {
                url,
                reason: format!("chart {} must be served over http(s)", self.chart),
            });
        }

        let index = RepositoryIndex::from_bytes(&self.client.get_bytes(&url).await?)?;
        let mut versions = index
            .entries
            .get(&self.chart)
            .cloned()
            .ok_or_else(|| RepoError::ChartNotFound {
                chart: self.chart.clone(),
                repo: self.repo.clone(),
            })?;

        versions.sort_by(compare_descending);
        for entry in &mut versions {
            if let Some(first) = entry.urls.first_mut()
                && !first.starts_with("http")
            {
                *first = format!("{}/{}", self.repo, first);
            }
        }

        Ok(SourceMetadata {
            source: kind,
            commit: None,
            subdirectory: None,
            versions,
        })
    }
}

#[async_trait]
impl Upstream for HelmRepoUpstream {
    fn kind(&self) -> SourceKind {
        SourceKind::HelmRepo
    }

    async fn fetch(&self) -> Result<SourceMetadata> {
        self.fetch_versions(SourceKind::HelmRepo).await
    }
}
