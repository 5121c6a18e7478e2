//! Maintenance of published charts
//!
//! Hiding packages, managing featured slots and culling old versions. These
//! are the only operations that rewrite published archives, and they only
//! touch `catalog.cattle.io` annotations.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use chartkeeper_core::{Package, Paths, annotations};

use crate::error::{RepoError, Result};
use crate::icons::IconStore;
use crate::index::{ChartEntry, RepositoryIndex};
use crate::store;

/// Number of featured slots in the Rancher UI
pub const FEATURED_MAX: u8 = 5;

/// Versions of a package to annotate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    AllVersions,
    LatestVersion,
}

/// Change one annotation on the published charts of `package`
///
/// `value` of `None` removes the annotation. Returns whether any chart changed.
fn annotate(
    paths: &Paths,
    package: &Package,
    key: &str,
    value: Option<&str>,
    scope: Scope,
) -> Result<bool> {
    let index = RepositoryIndex::load_or_default(&paths.index_yaml)?;
    if index.get(&package.name).is_none_or(Vec::is_empty) {
        return Err(RepoError::NotInIndex {
            name: package.name.clone(),
        });
    }

    let mut charts = store::load_existing_charts(paths, package)?;
    let latest = charts
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| chartkeeper_core::parse_lenient(c.chart().version()).ok())
        .map(|(i, _)| i);

    let mut changed = false;
    for (i, tracked) in charts.iter_mut().enumerate() {
        if scope == Scope::LatestVersion && Some(i) != latest {
            continue;
        }
        let modified = match value {
            Some(value) => tracked.annotate(key, value, true),
            None => tracked.deannotate(key, None),
        };
        if modified {
            tracing::debug!(
                "Modified annotations of {} ({})",
                package.name,
                tracked.chart().version()
            );
        }
        changed |= modified;
    }

    store::write_charts(paths, package, &charts)?;
    Ok(changed)
}

/// Hide every published version of `package` in the Rancher UI
pub fn hide(paths: &Paths, package: &Package) -> Result<bool> {
    let changed = annotate(paths, package, annotations::HIDDEN, Some("true"), Scope::AllVersions)?;
    store::write_index(paths, &IconStore::new(paths.clone()))?;
    Ok(changed)
}

/// Featured chart names by slot
///
/// Slots holding more than one chart are reported as conflicts.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FeaturedSlots {
    pub slots: BTreeMap<u8, Vec<String>>,
}

impl FeaturedSlots {
    pub fn has_conflicts(&self) -> bool {
        self.slots.values().any(|names| names.len() > 1)
    }
}

/// Featured charts of the index
pub fn featured(index: &RepositoryIndex) -> Result<FeaturedSlots> {
    let mut slots = FeaturedSlots::default();
    for (name, versions) in index.by_annotation(annotations::FEATURED, None) {
        let value = versions
            .first()
            .and_then(|v| v.metadata.annotations.get(annotations::FEATURED))
            .map(String::as_str)
            .unwrap_or_default();
        let slot = parse_slot(value)?;
        slots.slots.entry(slot).or_default().push(name);
    }
    Ok(slots)
}

/// Parse a featured slot, `1` to `FEATURED_MAX`
pub fn parse_slot(value: &str) -> Result<u8> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|slot| (1..=FEATURED_MAX).contains(slot))
        .ok_or_else(|| RepoError::Other(format!(
            "featured number must be between 1 and {}, got {:?}",
            FEATURED_MAX, value
        )))
}

/// Feature the latest published version of `package` at `slot`
pub fn add_featured(paths: &Paths, package: &Package, slot: u8) -> Result<()> {
    let slot_value = parse_slot(&slot.to_string())?.to_string();
    let index = RepositoryIndex::load_or_default(&paths.index_yaml)?;
    let taken = index.by_annotation(annotations::FEATURED, Some(&slot_value));
    if let Some(name) = taken.keys().next() {
        return Err(RepoError::Other(format!(
            "{} already featured at index {}",
            name, slot
        )));
    }

    annotate(paths, package, annotations::FEATURED, Some(&slot_value), Scope::LatestVersion)?;
    store::write_index(paths, &IconStore::new(paths.clone()))
}

/// Remove the featured annotation from every published version of `package`
pub fn remove_featured(paths: &Paths, package: &Package) -> Result<()> {
    annotate(paths, package, annotations::FEATURED, None, Scope::AllVersions)?;
    store::write_index(paths, &IconStore::new(paths.clone()))
}

/// Drop versions of `chart` created more than `days` days before `now`
///
/// Their archives are deleted and `index.yaml` is rewritten. Returns the
/// removed entries.
pub fn cull(paths: &Paths, chart: &str, days: u32, now: DateTime<Utc>) -> Result<Vec<ChartEntry>> {
    let mut index = RepositoryIndex::load(&paths.index_yaml)?;
    let versions = index.entries.get_mut(chart).ok_or_else(|| RepoError::NotInIndex {
        name: chart.to_string(),
    })?;

    let cutoff = now - Duration::days(i64::from(days));
    let (kept, culled): (Vec<ChartEntry>, Vec<ChartEntry>) =
        std::mem::take(versions).into_iter().partition(|e| e.created > cutoff);
    *versions = kept;

    for entry in &culled {
        for url in &entry.urls {
            let file = paths.root.join(url);
            std::fs::remove_file(&file).map_err(|e| {
                RepoError::Other(format!("failed to remove {}: {}", url, e))
            })?;
            tracing::info!("Removed {}", url);
        }
    }

    index.save(&paths.index_yaml)?;
    Ok(culled)
}
