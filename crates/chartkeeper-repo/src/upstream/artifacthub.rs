//! Artifact Hub upstream
//!
//! The package API names the Helm repository that actually serves the chart.

use async_trait::async_trait;
use serde::Deserialize;

use super::helm::HelmRepoUpstream;
use super::{SourceKind, SourceMetadata, Upstream};
use crate::error::{RepoError, Result};
use crate::http::HttpClient;

#[derive(Debug, Default, Deserialize)]
struct PackageResponse {
    #[serde(default)]
    content_url: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    repository: RepositoryResponse,
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryResponse {
    #[serde(default)]
    url: String,
}

/// A Helm package listed on Artifact Hub
#[derive(Debug, Clone)]
pub struct ArtifactHubUpstream {
    client: HttpClient,
    api: String,
    repo: String,
    package: String,
}

impl ArtifactHubUpstream {
    pub fn new(
        client: HttpClient,
        api: &str,
        repo: impl Into<String>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api: api.trim_end_matches('/').to_string(),
            repo: repo.into(),
            package: package.into(),
        }
    }
}

#[async_trait]
impl Upstream for ArtifactHubUpstream {
    fn kind(&self) -> SourceKind {
        SourceKind::ArtifactHub
    }

    async fn fetch(&self) -> Result<SourceMetadata> {
        let url = format!("{}/{}/{}", self.api, self.repo, self.package);
        let response: PackageResponse = self.client.get_json(&url).await?;

        if response.content_url.is_empty() {
            return Err(RepoError::ChartNotFound {
                chart: self.package.clone(),
                repo: format!("Artifact Hub repository {}", self.repo),
            });
        }
        tracing::debug!(
            "Artifact Hub package {}/{} is served by {}",
            self.repo,
            self.package,
            response.repository.url
        );

        HelmRepoUpstream::new(self.client.clone(), response.repository.url, response.name)
            .fetch_versions(SourceKind::ArtifactHub)
            .await
    }
}
