//! Error types for repository operations

use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("Invalid repository configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    // ============ Upstream Errors ============
    #[error("Chart {chart} not found in {repo}")]
    ChartNotFound { chart: String, repo: String },

    #[error("No versions available in upstream for {name}, or all versions are pre-releases")]
    NoEligibleVersions { name: String },

    #[error("Upstream versions of {name} are not sorted newest first: {version} follows {previous}")]
    UnsortedVersions {
        name: String,
        previous: String,
        version: String,
    },

    #[error("Git upstream error: {message}")]
    GitUpstream { message: String },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Git status is not clean: {paths}")]
    DirtyWorkTree { paths: String },

    // ============ Index Errors ============
    #[error("Index parse error: {message}")]
    IndexParseError { message: String },

    #[error("Chart {name} not present in index.yaml")]
    NotInIndex { name: String },

    // ============ Integration Errors ============
    #[error("Found two different values for featured annotation: {first:?} and {second:?}")]
    FeaturedConflict { first: String, second: String },

    #[error("Icon error for {package}: {message}")]
    Icon { package: String, message: String },

    #[error("Failed to {action} {chart} version {version}: {source}")]
    ChartOperation {
        action: &'static str,
        chart: String,
        version: String,
        #[source]
        source: Box<RepoError>,
    },

    #[error("All {count} package(s) failed")]
    AllPackagesFailed { count: usize },

    // ============ Validation Errors ============
    #[error("{message}")]
    Validation { message: String },

    // ============ Core / IO Errors ============
    #[error(transparent)]
    Core(#[from] chartkeeper_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// Attach chart context to an error raised while processing one chart
    pub fn for_chart(self, action: &'static str, chart: &str, version: &str) -> Self {
        RepoError::ChartOperation {
            action,
            chart: chart.to_string(),
            version: version.to_string(),
            source: Box::new(self),
        }
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout { seconds: 30 }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}

impl From<semver::Error> for RepoError {
    fn from(e: semver::Error) -> Self {
        RepoError::Core(chartkeeper_core::CoreError::InvalidVersion(e))
    }
}
