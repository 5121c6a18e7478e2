//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid chart: {message}")]
    InvalidChart { message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("Invalid package version {package_version}: must be between 0 and 99")]
    PackageVersionOutOfRange { package_version: u64 },

    #[error("Invalid upstream.yaml at {path}: {message}")]
    InvalidUpstream { path: String, message: String },

    #[error("Unknown fetch mode: {mode}")]
    UnknownFetchMode { mode: String },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
