//! chartkeeper Repository Reconciliation
//!
//! This crate keeps a Helm chart repository in sync with the upstreams its
//! packages name, without ever altering a chart version once it is
//! published:
//!
//! - **Version selection**: which upstream versions a run must fetch
//! - **Integration**: package policy applied to new charts, with the
//!   featured annotation kept on a single version
//! - **Release validation**: content-aware comparison of `assets/` with the
//!   released branch, plus structural repository checks
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartkeeper_core::Paths;
//! use chartkeeper_repo::{Reconciler, RepositoryConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let paths = Paths::new(".");
//! let config = RepositoryConfig::load(&paths.configuration_yaml)?;
//!
//! let reconciler = Reconciler::new(paths, config)?;
//! let report = reconciler.stage(None).await?;
//! reconciler.commit(&report)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod icons;
pub mod index;
pub mod integrate;
pub mod maintain;
pub mod reconcile;
pub mod select;
pub mod store;
pub mod upstream;
pub mod validate;
pub mod vcs;

// Re-exports for convenience
pub use config::{FeaturedPlacement, RepositoryConfig, ValidateUpstream};
pub use error::{RepoError, Result};
pub use http::{Fetched, HttpClient};
pub use icons::{IconFetcher, IconFormat, IconStore};
pub use index::{ChartEntry, RepositoryIndex};
pub use integrate::{Integrator, TrackedChart, ensure_featured};
pub use reconcile::{PackageUpdate, Reconciler, StageReport, commit_message};
pub use select::select_versions;
pub use upstream::{Endpoints, SourceKind, SourceMetadata, Upstream, create_upstream};
pub use validate::{DirectoryComparison, compare_directories, match_helm_charts};
