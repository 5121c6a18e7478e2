//! Git upstream
//!
//! The chart is read from a clone of the repository, at the branch tip or at
//! the commit of the latest GitHub release.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use chartkeeper_core::Chart;

use super::{SourceKind, SourceMetadata, Upstream};
use crate::error::{RepoError, Result};
use crate::http::HttpClient;
use crate::index::ChartEntry;
use crate::vcs;

const TAGS_PER_PAGE: usize = 50;

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
    commit: TagCommit,
}

#[derive(Debug, Deserialize)]
struct TagCommit {
    sha: String,
}

/// A chart kept in a git repository
#[derive(Debug, Clone)]
pub struct GitUpstream {
    pub client: HttpClient,
    pub github_api: String,
    pub url: String,
    pub branch: Option<String>,
    pub subdirectory: Option<String>,
    /// Read the chart at the latest GitHub release instead of the branch tip
    pub github_release: bool,
}

impl GitUpstream {
    /// Commit SHA of the tag behind the latest GitHub release
    async fn latest_release_commit(&self) -> Result<String> {
        let (owner, repo) = github_owner_repo(&self.url)?;
        let api = self.github_api.trim_end_matches('/');

        let release: Release = self
            .client
            .get_json(&format!("{}/repos/{}/{}/releases/latest", api, owner, repo))
            .await?;

        let mut page = 1;
        loop {
            let tags: Vec<Tag> = self
                .client
                .get_json(&format!(
                    "{}/repos/{}/{}/tags?per_page={}&page={}",
                    api, owner, repo, TAGS_PER_PAGE, page
                ))
                .await?;
            if tags.is_empty() {
                break;
            }
            if let Some(tag) = tags.into_iter().find(|t| t.name == release.tag_name) {
                tracing::debug!(
                    "Fetching GitHub release: {} ({})",
                    release.name.as_deref().unwrap_or(&release.tag_name),
                    tag.commit.sha
                );
                return Ok(tag.commit.sha);
            }
            page += 1;
        }

        Err(RepoError::GitUpstream {
            message: format!("commit not found for GitHub release {}", release.tag_name),
        })
    }
}

#[async_trait]
impl Upstream for GitUpstream {
    fn kind(&self) -> SourceKind {
        SourceKind::Git
    }

    async fn fetch(&self) -> Result<SourceMetadata> {
        let release_commit = if self.github_release {
            Some(self.latest_release_commit().await?)
        } else {
            None
        };

        let clone_dir = TempDir::new()?;
        let repo = vcs::clone(
            &self.url,
            self.branch.as_deref(),
            !self.github_release,
            clone_dir.path(),
        )?;
        let commit = match release_commit {
            Some(commit) => {
                vcs::checkout_commit(&repo, &commit)?;
                commit
            }
            None => vcs::head_commit(&repo)?,
        };

        let chart_dir = chart_dir(clone_dir.path(), self.subdirectory.as_deref())?;
        tracing::debug!("Loading git chart from {}", chart_dir.display());
        let chart = Chart::load_dir(&chart_dir)?;

        let entry = ChartEntry {
            metadata: chart.metadata,
            urls: vec![self.url.clone()],
            created: Utc::now(),
            digest: String::new(),
            removed: false,
        };

        Ok(SourceMetadata {
            source: SourceKind::Git,
            commit: Some(commit),
            subdirectory: self.subdirectory.clone(),
            versions: vec![entry],
        })
    }
}

/// Directory of the chart inside a clone
pub(super) fn chart_dir(clone: &Path, subdirectory: Option<&str>) -> Result<PathBuf> {
    match subdirectory.filter(|s| !s.is_empty()) {
        None => Ok(clone.to_path_buf()),
        Some(subdirectory) => {
            let dir = clone.join(subdirectory);
            if !dir.is_dir() {
                return Err(RepoError::GitUpstream {
                    message: format!("git subdirectory '{}' does not exist", subdirectory),
                });
            }
            Ok(dir)
        }
    }
}

/// `(owner, repo)` of a `https://github.com/<owner>/<repo>[.git]` URL
fn github_owner_repo(url: &str) -> Result<(String, String)> {
    let not_github = || RepoError::InvalidUrl {
        url: url.to_string(),
        reason: "not a GitHub URL".to_string(),
    };

    let path = url
        .strip_prefix("https://github.com/")
        .ok_or_else(not_github)?
        .trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let mut parts = path.split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(not_github()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::load_chart;
    use crate::vcs::tests::init_repo;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CHART_YAML: &[u8] = b"apiVersion: v2\nname: app\nversion: 0.4.0\n";

    fn upstream(url: String, subdirectory: Option<&str>) -> GitUpstream {
        GitUpstream {
            client: HttpClient::new().unwrap(),
            github_api: "http://127.0.0.1:9".to_string(),
            url,
            branch: None,
            subdirectory: subdirectory.map(str::to_string),
            github_release: false,
        }
    }

    #[tokio::test]
    async fn test_fetch_reads_chart_at_head() {
        let origin = TempDir::new().unwrap();
        let sha = init_repo(
            origin.path(),
            &[
                ("charts/app/Chart.yaml", CHART_YAML),
                ("charts/app/values.yaml", b"a: 1\n"),
                ("README.md", b"readme"),
            ],
        );

        let url = origin.path().to_string_lossy().into_owned();
        let source = upstream(url.clone(), Some("charts/app"));
        let metadata = source.fetch().await.unwrap();

        assert_eq!(metadata.source, SourceKind::Git);
        assert_eq!(metadata.commit.as_deref(), Some(sha.as_str()));
        assert_eq!(metadata.versions.len(), 1);
        assert_eq!(metadata.versions[0].version(), "0.4.0");
        assert_eq!(metadata.versions[0].urls, vec![url]);

        let chart = load_chart(&source.client, &metadata, &metadata.versions[0])
            .await
            .unwrap();
        assert_eq!(chart.name(), "app");
        assert!(chart.file("values.yaml").is_some());
        assert!(chart.file("README.md").is_none());
    }

    #[tokio::test]
    async fn test_fetch_missing_subdirectory() {
        let origin = TempDir::new().unwrap();
        init_repo(origin.path(), &[("Chart.yaml", CHART_YAML)]);

        let source = upstream(origin.path().to_string_lossy().into_owned(), Some("nope"));
        let err = source.fetch().await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_latest_release_commit_pages_through_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "v2.0.0",
                "name": "Release 2.0.0"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/tags"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "name": "v1.0.0", "commit": { "sha": "aaa" } }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/tags"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "name": "v2.0.0", "commit": { "sha": "bbb" } }
            ])))
            .mount(&server)
            .await;

        let mut source = upstream("https://github.com/acme/app.git".to_string(), None);
        source.github_api = server.uri();
        source.github_release = true;

        assert_eq!(source.latest_release_commit().await.unwrap(), "bbb");
    }

    #[tokio::test]
    async fn test_latest_release_without_matching_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/releases/latest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "tag_name": "v9" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let mut source = upstream("https://github.com/acme/app".to_string(), None);
        source.github_api = server.uri();
        let err = source.latest_release_commit().await.unwrap_err();
        assert!(matches!(err, RepoError::GitUpstream { .. }));
    }

    #[test]
    fn test_github_owner_repo() {
        assert_eq!(
            github_owner_repo("https://github.com/acme/app.git").unwrap(),
            ("acme".to_string(), "app".to_string())
        );
        assert!(github_owner_repo("https://gitlab.com/acme/app").is_err());
        assert!(github_owner_repo("https://github.com/acme").is_err());
    }
}
