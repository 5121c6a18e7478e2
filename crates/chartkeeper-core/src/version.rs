//! Chart version handling
//!
//! Upstream charts do not always publish strict SemVer, so parsing accepts a
//! leading `v` and fills in missing minor and patch components.
//!
//! A package version is a repository-local revision folded into the patch
//! component: upstream `1.4.2` with package version `3` is published as
//! `1.4.203`.

use semver::Version;
use std::cmp::Ordering;
use std::fmt;

use crate::error::{CoreError, Result};

/// Multiplier applied to the upstream patch when a package version is set
pub const PATCH_MULTIPLIER: u64 = 100;

/// Largest package version that fits in the patch encoding
pub const MAX_PACKAGE_VERSION: u64 = PATCH_MULTIPLIER - 1;

/// Parse a version, tolerating a `v` prefix and missing components
pub fn parse_lenient(input: &str) -> Result<Version> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    // Split off pre-release/build so only the numeric core is padded
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Ok(Version::parse(trimmed)?);
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(rest);
    Ok(Version::parse(&padded)?)
}

/// Whether the version carries a pre-release component
pub fn is_prerelease(version: &Version) -> bool {
    !version.pre.is_empty()
}

/// Fold a package version into the patch of an upstream chart version
///
/// A package version of zero leaves the version untouched apart from
/// normalization.
pub fn encode_package_version(upstream: &str, package_version: u64) -> Result<String> {
    let mut version = parse_lenient(upstream)?;
    if package_version > MAX_PACKAGE_VERSION {
        return Err(CoreError::PackageVersionOutOfRange { package_version });
    }
    if package_version != 0 {
        version.patch = version.patch * PATCH_MULTIPLIER + package_version;
    }
    Ok(version.to_string())
}

/// Recover the upstream version from a version published with `package_version`
///
/// Versions that could not have been produced by the encoding, such as ones
/// published before the package version was configured, are returned
/// normalized but otherwise unchanged. A package version of zero is the
/// identity.
pub fn strip_package_version(published: &str, package_version: u64) -> Result<String> {
    let mut version = parse_lenient(published)?;
    if package_version != 0
        && let Some(base) = version.patch.checked_sub(package_version)
        && base % PATCH_MULTIPLIER == 0
    {
        version.patch = base / PATCH_MULTIPLIER;
    }
    Ok(version.to_string())
}

/// A `major.minor` release stream that is reconciled on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackedStream {
    pub major: u64,
    pub minor: u64,
}

impl TrackedStream {
    /// Parse a stream from `1.4`, `v1.4` or a full version such as `1.4.0`
    pub fn parse(input: &str) -> Result<Self> {
        let version = parse_lenient(input)?;
        Ok(Self {
            major: version.major,
            minor: version.minor,
        })
    }

    /// Order of a version's `major.minor` relative to this stream
    pub fn compare(&self, version: &Version) -> Ordering {
        (version.major, version.minor).cmp(&(self.major, self.minor))
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.compare(version) == Ordering::Equal
    }
}

impl fmt::Display for TrackedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient() {
        assert_eq!(parse_lenient("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_lenient("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_lenient("1.2").unwrap(), Version::new(1, 2, 0));
        assert_eq!(parse_lenient("2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(parse_lenient("1.2-rc.1").unwrap().pre.as_str(), "rc.1");
        assert!(parse_lenient("not-a-version").is_err());
        assert!(parse_lenient("1..2").is_err());
    }

    #[test]
    fn test_is_prerelease() {
        assert!(is_prerelease(&parse_lenient("1.0.0-beta").unwrap()));
        assert!(!is_prerelease(&parse_lenient("1.0.0+build.5").unwrap()));
    }

    #[test]
    fn test_encode_package_version() {
        assert_eq!(encode_package_version("1.4.2", 3).unwrap(), "1.4.203");
        assert_eq!(encode_package_version("1.4.2", 0).unwrap(), "1.4.2");
        assert_eq!(encode_package_version("v2.0", 1).unwrap(), "2.0.1");
        assert_eq!(encode_package_version("1.4.2", 99).unwrap(), "1.4.299");
    }

    #[test]
    fn test_encode_package_version_out_of_range() {
        let err = encode_package_version("1.4.2", 100).unwrap_err();
        assert!(matches!(
            err,
            CoreError::PackageVersionOutOfRange {
                package_version: 100
            }
        ));
    }

    #[test]
    fn test_strip_package_version() {
        assert_eq!(strip_package_version("1.4.203", 3).unwrap(), "1.4.2");
        assert_eq!(strip_package_version("1.4.3", 3).unwrap(), "1.4.0");
        assert_eq!(strip_package_version("v1.4.199", 99).unwrap(), "1.4.1");
        // published before the package version was set
        assert_eq!(strip_package_version("1.4.2", 3).unwrap(), "1.4.2");
        assert_eq!(strip_package_version("1.4.150", 0).unwrap(), "1.4.150");
    }

    #[test]
    fn test_strip_recovers_upstream() {
        for upstream in ["3.1.7", "1.4.0", "2.0.150"] {
            for package_version in [0, 1, 99] {
                let encoded = encode_package_version(upstream, package_version).unwrap();
                assert_eq!(
                    strip_package_version(&encoded, package_version).unwrap(),
                    upstream,
                    "{} + {}",
                    upstream,
                    package_version
                );
            }
        }
    }

    #[test]
    fn test_tracked_stream() {
        let stream = TrackedStream::parse("1.4").unwrap();
        assert_eq!(stream.to_string(), "1.4");
        assert!(stream.contains(&Version::new(1, 4, 9)));
        assert_eq!(stream.compare(&Version::new(1, 3, 9)), Ordering::Less);
        assert_eq!(stream.compare(&Version::new(2, 0, 0)), Ordering::Greater);
        assert_eq!(TrackedStream::parse("v2.1.5").unwrap().minor, 1);
    }
}
