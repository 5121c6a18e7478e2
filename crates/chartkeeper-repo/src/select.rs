//! Version selection
//!
//! Decides which upstream chart versions a run must fetch, given the
//! package's fetch mode, its tracked streams and the versions already
//! published in the repository index.

use semver::Version;
use std::cmp::Ordering;

use chartkeeper_core::{FetchMode, TrackedStream, is_prerelease, parse_lenient, strip_package_version};

use crate::error::{RepoError, Result};
use crate::index::{ChartEntry, compare_descending};

/// An upstream entry paired with its parsed version
#[derive(Debug, Clone)]
struct Candidate<'a> {
    entry: &'a ChartEntry,
    version: Version,
}

/// Select the upstream versions to fetch
///
/// `upstream` must be ordered newest first. The result keeps that order,
/// grouped by tracked stream in configured order when streams are given.
/// Stored versions are matched after removing `package_version` from them.
pub fn select_versions(
    name: &str,
    upstream: &[ChartEntry],
    mode: FetchMode,
    streams: &[TrackedStream],
    package_version: u64,
    stored: &[ChartEntry],
) -> Result<Vec<ChartEntry>> {
    tracing::debug!("Filtering versions for {}", name);

    let candidates = strip_prereleases(upstream);
    if candidates.is_empty() {
        return Err(RepoError::NoEligibleVersions {
            name: name.to_string(),
        });
    }

    let mut stored: Vec<&ChartEntry> = stored.iter().collect();
    stored.sort_by(|a, b| compare_descending(a, b));

    if streams.is_empty() {
        return Ok(collect_unstored(&candidates, &stored, mode, package_version));
    }

    ensure_descending(name, &candidates)?;

    let untracked = newer_untracked(streams, &candidates);
    if untracked.is_empty() {
        tracing::debug!("No newer untracked versions found");
    } else {
        tracing::warn!(
            "Newer untracked version available: {} ({})",
            name,
            untracked.join(", ")
        );
    }

    let stored_candidates: Vec<Candidate<'_>> = stored
        .iter()
        .filter_map(|entry| {
            parse_lenient(entry.version())
                .ok()
                .map(|version| Candidate { entry, version })
        })
        .collect();

    let mut selected = Vec::new();
    for stream in streams {
        let upstream_bucket = bucket(&candidates, stream);
        let stored_bucket: Vec<&ChartEntry> = bucket(&stored_candidates, stream)
            .into_iter()
            .map(|c| c.entry)
            .collect();
        selected.extend(collect_unstored(
            &upstream_bucket,
            &stored_bucket,
            mode,
            package_version,
        ));
    }

    Ok(selected)
}

/// Parse every entry and drop pre-releases; unparsable versions are logged and dropped
fn strip_prereleases(upstream: &[ChartEntry]) -> Vec<Candidate<'_>> {
    upstream
        .iter()
        .filter_map(|entry| match parse_lenient(entry.version()) {
            Ok(version) if is_prerelease(&version) => None,
            Ok(version) => Some(Candidate { entry, version }),
            Err(e) => {
                tracing::error!("{} {}: {}", entry.name(), entry.version(), e);
                None
            }
        })
        .collect()
}

fn ensure_descending(name: &str, candidates: &[Candidate<'_>]) -> Result<()> {
    for pair in candidates.windows(2) {
        if pair[1].version >= pair[0].version {
            return Err(RepoError::UnsortedVersions {
                name: name.to_string(),
                previous: pair[0].version.to_string(),
                version: pair[1].version.to_string(),
            });
        }
    }
    Ok(())
}

/// Versions of one stream, scanning newest first and stopping below the stream
fn bucket<'a>(candidates: &[Candidate<'a>], stream: &TrackedStream) -> Vec<Candidate<'a>> {
    let mut matched = Vec::new();
    for candidate in candidates {
        match stream.compare(&candidate.version) {
            Ordering::Equal => {
                tracing::debug!("Appending version {} tracking {}", candidate.version, stream);
                matched.push(candidate.clone());
            }
            Ordering::Less => break,
            Ordering::Greater => {}
        }
    }
    matched
}

/// Upstream versions whose `major.minor` is above every tracked stream
fn newer_untracked(streams: &[TrackedStream], candidates: &[Candidate<'_>]) -> Vec<String> {
    let Some(latest) = streams.iter().max_by_key(|s| (s.major, s.minor)) else {
        return Vec::new();
    };
    tracing::debug!("Checking for versions newer than latest tracked {}", latest);

    let mut newer = Vec::new();
    for candidate in candidates {
        match latest.compare(&candidate.version) {
            Ordering::Greater => newer.push(candidate.version.to_string()),
            Ordering::Equal => break,
            Ordering::Less => {}
        }
    }
    newer
}

fn is_stored(version: &Version, stored: &[&ChartEntry], package_version: u64) -> bool {
    let normalized = version.to_string();
    stored
        .iter()
        .any(|entry| match strip_package_version(entry.version(), package_version) {
            Ok(stripped) if stripped == normalized => {
                if entry.version() == normalized {
                    tracing::debug!("Found version {}", entry.version());
                } else {
                    tracing::debug!("Found modified version {}", entry.version());
                }
                true
            }
            _ => false,
        })
}

fn collect_unstored(
    candidates: &[Candidate<'_>],
    stored: &[&ChartEntry],
    mode: FetchMode,
    package_version: u64,
) -> Vec<ChartEntry> {
    let newest_stored = stored.first().and_then(|entry| {
        strip_package_version(entry.version(), package_version)
            .and_then(|v| parse_lenient(&v))
            .map_err(|e| tracing::error!("{}: {}", entry.version(), e))
            .ok()
    });

    let mut selected = Vec::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let stored_already = is_stored(&candidate.version, stored, package_version);

        if stored_already {
            if i == 0 && mode == FetchMode::Latest {
                tracing::debug!("Latest version already stored");
                break;
            }
            continue;
        }

        match mode {
            FetchMode::Latest => {
                selected.push(candidate.entry.clone());
                break;
            }
            FetchMode::All => selected.push(candidate.entry.clone()),
            FetchMode::Newer => match (&newest_stored, stored.is_empty()) {
                (_, true) => selected.push(candidate.entry.clone()),
                (Some(newest), false) if candidate.version > *newest => {
                    tracing::debug!("Version: {} > {}", candidate.version, newest);
                    selected.push(candidate.entry.clone());
                }
                _ => {}
            },
        }
    }
    selected
}
