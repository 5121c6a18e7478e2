//! Upstream chart sources
//!
//! Every package names exactly one upstream: a Helm repository, an Artifact
//! Hub package (resolved to its Helm repository) or a git repository. An
//! upstream reports the chart versions it offers; the charts themselves are
//! loaded afterwards, only for the versions selected for fetching.

mod artifacthub;
mod git;
mod helm;

pub use artifacthub::ArtifactHubUpstream;
pub use git::GitUpstream;
pub use helm::HelmRepoUpstream;

use async_trait::async_trait;
use std::fmt;
use tempfile::TempDir;

use chartkeeper_core::{Chart, UpstreamYaml};

use crate::error::{RepoError, Result};
use crate::http::HttpClient;
use crate::index::ChartEntry;
use crate::vcs;

/// Public Artifact Hub Helm package API
pub const ARTIFACT_HUB_API: &str = "https://artifacthub.io/api/v1/packages/helm";

/// Public GitHub REST API
pub const GITHUB_API: &str = "https://api.github.com";

/// Kind of upstream a package is fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    HelmRepo,
    ArtifactHub,
    Git,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::HelmRepo => write!(f, "HelmRepo"),
            SourceKind::ArtifactHub => write!(f, "ArtifactHub"),
            SourceKind::Git => write!(f, "Git"),
        }
    }
}

/// What an upstream offers
#[derive(Debug, Clone)]
pub struct SourceMetadata {
    pub source: SourceKind,
    /// Commit the git chart was read at
    pub commit: Option<String>,
    pub subdirectory: Option<String>,
    /// Newest first
    pub versions: Vec<ChartEntry>,
}

/// API base URLs, replaceable for tests and mirrors
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub artifact_hub: String,
    pub github: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            artifact_hub: ARTIFACT_HUB_API.to_string(),
            github: GITHUB_API.to_string(),
        }
    }
}

/// A place charts are fetched from
#[async_trait]
pub trait Upstream: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// List the chart versions this upstream offers
    async fn fetch(&self) -> Result<SourceMetadata>;
}

/// Pick the upstream configured in `upstream.yaml`
///
/// Artifact Hub wins over a Helm repository, which wins over git.
pub fn create_upstream(
    upstream: &UpstreamYaml,
    client: &HttpClient,
    endpoints: &Endpoints,
) -> Result<Box<dyn Upstream>> {
    let set = |value: &Option<String>| value.as_deref().filter(|v| !v.is_empty()).map(str::to_string);

    if let (Some(repo), Some(package)) = (
        set(&upstream.artifact_hub_repo),
        set(&upstream.artifact_hub_package),
    ) {
        return Ok(Box::new(ArtifactHubUpstream::new(
            client.clone(),
            &endpoints.artifact_hub,
            repo,
            package,
        )));
    }

    if let (Some(repo), Some(chart)) = (set(&upstream.helm_repo), set(&upstream.helm_chart)) {
        return Ok(Box::new(HelmRepoUpstream::new(client.clone(), repo, chart)));
    }

    if let Some(url) = set(&upstream.git_repo) {
        return Ok(Box::new(GitUpstream {
            client: client.clone(),
            github_api: endpoints.github.clone(),
            url,
            branch: set(&upstream.git_branch),
            subdirectory: set(&upstream.git_subdirectory),
            github_release: upstream.github_release,
        }));
    }

    Err(RepoError::InvalidConfig {
        message: "no valid upstream options found".to_string(),
    })
}

/// Fetch the versions a package's upstream offers
///
/// A `ChartMetadata.name` in `upstream.yaml` renames every version.
pub async fn fetch_upstream(
    upstream: &UpstreamYaml,
    client: &HttpClient,
    endpoints: &Endpoints,
) -> Result<SourceMetadata> {
    let source = create_upstream(upstream, client, endpoints)?;
    let mut metadata = source.fetch().await?;
    tracing::debug!(
        "{} upstream offers {} version(s)",
        source.kind(),
        metadata.versions.len()
    );

    let rename = &upstream.chart_metadata.name;
    if !rename.is_empty() {
        for entry in &mut metadata.versions {
            entry.metadata.name = rename.clone();
        }
    }

    Ok(metadata)
}

/// Load the chart of one offered version
pub async fn load_chart(
    client: &HttpClient,
    source: &SourceMetadata,
    entry: &ChartEntry,
) -> Result<Chart> {
    let url = entry.download_url().ok_or_else(|| RepoError::InvalidUrl {
        url: String::new(),
        reason: format!("{} {} has no download URL", entry.name(), entry.version()),
    })?;

    match (source.source, source.commit.as_deref()) {
        (SourceKind::Git, Some(commit)) => {
            load_chart_from_git(url, source.subdirectory.as_deref(), commit)
        }
        _ => {
            tracing::debug!("Loading chart from {}", url);
            let data = client.get_bytes(url).await?;
            Ok(Chart::load_archive_bytes(&data)?)
        }
    }
}

fn load_chart_from_git(url: &str, subdirectory: Option<&str>, commit: &str) -> Result<Chart> {
    let clone_dir = TempDir::new()?;
    let repo = vcs::clone(url, None, false, clone_dir.path())?;
    vcs::checkout_commit(&repo, commit)?;
    let chart_dir = git::chart_dir(clone_dir.path(), subdirectory)?;
    Ok(Chart::load_dir(&chart_dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn upstream(yaml: &str) -> UpstreamYaml {
        UpstreamYaml::from_yaml(yaml, Path::new("upstream.yaml")).unwrap()
    }

    #[test]
    fn test_create_upstream_precedence() {
        let client = HttpClient::new().unwrap();
        let endpoints = Endpoints::default();

        let helm = upstream("HelmRepo: https://charts.example.com\nHelmChart: app\n");
        assert_eq!(
            create_upstream(&helm, &client, &endpoints).unwrap().kind(),
            SourceKind::HelmRepo
        );

        let hub = upstream("ArtifactHubRepo: acme\nArtifactHubPackage: app\n");
        assert_eq!(
            create_upstream(&hub, &client, &endpoints).unwrap().kind(),
            SourceKind::ArtifactHub
        );

        let git = upstream("GitRepo: https://github.com/acme/app\n");
        assert_eq!(
            create_upstream(&git, &client, &endpoints).unwrap().kind(),
            SourceKind::Git
        );
    }

    #[test]
    fn test_create_upstream_without_source() {
        let client = HttpClient::new().unwrap();
        let err = create_upstream(&UpstreamYaml::default(), &client, &Endpoints::default())
            .err()
            .unwrap();
        assert!(matches!(err, RepoError::InvalidConfig { .. }));
    }
}
