//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps library errors to appropriate exit codes.

use miette::Diagnostic;
use thiserror::Error;

use chartkeeper_core::CoreError;
use chartkeeper_repo::RepoError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Released charts were modified or repository checks failed
    #[error("Validation failed: {message}")]
    #[diagnostic(code(chartkeeper::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Fetching or integrating upstream charts failed
    #[error("Reconcile error: {message}")]
    #[diagnostic(code(chartkeeper::cli::reconcile))]
    Reconcile { message: String },

    /// Invalid package or repository configuration
    #[error("Package error: {message}")]
    #[diagnostic(code(chartkeeper::cli::package))]
    Package {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(chartkeeper::cli::usage))]
    Usage { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartkeeper::cli::io))]
    Io { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(chartkeeper::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Reconcile { .. } => exit_codes::RECONCILE_ERROR,
            CliError::Package { .. } => exit_codes::PACKAGE_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a usage error (user provided invalid input)
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            CoreError::InvalidUpstream { .. } | CoreError::UnknownFetchMode { .. } => {
                CliError::Package {
                    message: err.to_string(),
                    help: Some("Check the package's upstream.yaml".to_string()),
                }
            }
            other => CliError::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Core(e) => e.into(),
            RepoError::Io(e) => e.into(),
            RepoError::InvalidConfig { .. } => CliError::Package {
                message: err.to_string(),
                help: Some("Check configuration.yaml at the repository root".to_string()),
            },
            RepoError::Validation { message } => CliError::Validation {
                message,
                help: None,
            },
            RepoError::AllPackagesFailed { .. }
            | RepoError::FeaturedConflict { .. }
            | RepoError::ChartOperation { .. }
            | RepoError::NoEligibleVersions { .. }
            | RepoError::UnsortedVersions { .. } => CliError::Reconcile {
                message: err.to_string(),
            },
            other => CliError::Other {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err: CliError = RepoError::AllPackagesFailed { count: 2 }.into();
        assert_eq!(err.exit_code(), exit_codes::RECONCILE_ERROR);

        let err: CliError = RepoError::InvalidConfig {
            message: "must provide validation configuration".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::PACKAGE_ERROR);

        let err: CliError = RepoError::Io(std::io::Error::other("denied")).into();
        assert_eq!(err.exit_code(), exit_codes::IO_ERROR);

        let err: CliError = CoreError::UnknownFetchMode {
            mode: "sometimes".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::PACKAGE_ERROR);

        assert_eq!(CliError::usage("bad").exit_code(), exit_codes::USAGE_ERROR);
    }
}
