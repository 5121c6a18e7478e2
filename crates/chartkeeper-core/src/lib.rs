//! chartkeeper Core - Core types for keeping a Helm chart repository in sync
//!
//! This crate provides the foundational types used throughout chartkeeper:
//! - `Chart`: A Helm chart, its `Chart.yaml` metadata and files, with the `.tgz` codec
//! - `Package`: A repository package and its `upstream.yaml`
//! - `version`: Lenient SemVer parsing and package version encoding
//! - `Paths`: The repository layout

pub mod archive;
pub mod chart;
pub mod error;
pub mod package;
pub mod paths;
pub mod version;

pub use chart::{Chart, ChartFile, ChartMetadata, Dependency, Maintainer, annotations};
pub use error::{CoreError, Result};
pub use package::{FetchMode, Package, UpstreamYaml, list_packages};
pub use paths::Paths;
pub use version::{
    TrackedStream, encode_package_version, is_prerelease, parse_lenient, strip_package_version,
};
