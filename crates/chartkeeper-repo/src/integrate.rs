//! Chart integration
//!
//! Applies package policy to newly fetched charts and keeps the featured
//! annotation on a single chart version. Charts that are already published
//! are only ever touched to move the featured annotation.

use std::collections::BTreeMap;

use chartkeeper_core::{Chart, Package, annotations, encode_package_version, parse_lenient};

use crate::config::FeaturedPlacement;
use crate::error::{RepoError, Result};
use crate::icons::{IconFetcher, IconStore};

/// A chart together with whether it must be written back to disk
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedChart {
    chart: Chart,
    modified: bool,
}

impl TrackedChart {
    /// Wrap a chart as it currently is on disk
    pub fn new(chart: Chart) -> Self {
        Self {
            chart,
            modified: false,
        }
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn into_chart(self) -> Chart {
        self.chart
    }

    /// Set an annotation, marking the chart modified if it changed
    pub fn annotate(&mut self, key: &str, value: &str, replace: bool) -> bool {
        let changed = self.chart.annotate(key, value, replace);
        self.modified |= changed;
        changed
    }

    /// Remove an annotation, marking the chart modified if it changed
    pub fn deannotate(&mut self, key: &str, value: Option<&str>) -> bool {
        let changed = self.chart.deannotate(key, value);
        self.modified |= changed;
        changed
    }
}

/// Package policy applied to new charts
pub struct Integrator<'a> {
    pub package: &'a Package,
    pub overlay_files: &'a BTreeMap<String, Vec<u8>>,
    pub icons: &'a IconStore,
    pub fetcher: &'a dyn IconFetcher,
    pub placement: FeaturedPlacement,
}

impl Integrator<'_> {
    /// Apply policy to `new` charts and enforce the featured singleton over `existing` and `new`
    ///
    /// Returns the new charts, all marked modified.
    pub async fn integrate(
        &self,
        existing: &mut [TrackedChart],
        new: Vec<Chart>,
    ) -> Result<Vec<TrackedChart>> {
        let mut integrated = Vec::with_capacity(new.len());
        for mut chart in new {
            let (name, version) = (chart.name().to_string(), chart.version().to_string());
            self.conform(&mut chart)
                .map_err(|e| e.for_chart("conform", &name, &version))?;

            let icon = self
                .icons
                .ensure_icon(self.fetcher, &self.package.name, chart.metadata.icon.as_deref())
                .await
                .map_err(|e| e.for_chart("ensure icon for", &name, &version))?;
            chart.metadata.icon = Some(icon);

            integrated.push(TrackedChart {
                chart,
                modified: true,
            });
        }

        ensure_featured(existing, &mut integrated, self.placement)?;
        Ok(integrated)
    }

    /// Overlay files, metadata overlay, annotations and package version
    fn conform(&self, chart: &mut Chart) -> Result<()> {
        let upstream = &self.package.upstream;

        for (name, data) in self.overlay_files {
            chart.put_file(name.clone(), data.clone());
        }

        let own_kube_version = chart.metadata.kube_version.clone();
        chart.metadata.apply_overlay(&upstream.chart_metadata);
        chart.metadata.deprecated |= upstream.deprecated;

        for (key, value) in self.annotations(own_kube_version) {
            chart.annotate(key, &value, false);
        }

        if !upstream.remote_dependencies {
            for dependency in &mut chart.metadata.dependencies {
                dependency.repository = Some(format!("file://./charts/{}", dependency.name));
            }
        }

        if upstream.package_version != 0 {
            chart.metadata.version =
                encode_package_version(&chart.metadata.version, upstream.package_version)?;
        }

        Ok(())
    }

    fn annotations(&self, own_kube_version: Option<String>) -> Vec<(&'static str, String)> {
        let upstream = &self.package.upstream;
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        let mut set = Vec::new();
        if let Some(auto_install) = non_empty(&upstream.auto_install) {
            set.push((annotations::AUTO_INSTALL, auto_install));
        }
        if upstream.experimental {
            set.push((annotations::EXPERIMENTAL, "true".to_string()));
        }
        if upstream.hidden {
            set.push((annotations::HIDDEN, "true".to_string()));
        }
        set.push((
            annotations::CERTIFIED,
            annotations::CERTIFIED_PARTNER.to_string(),
        ));
        set.push((annotations::DISPLAY_NAME, self.package.display_name.clone()));
        set.push((
            annotations::RELEASE_NAME,
            self.package.release_name().to_string(),
        ));
        if let Some(namespace) = non_empty(&upstream.namespace) {
            set.push((annotations::NAMESPACE, namespace));
        }

        let kube_version = non_empty(&upstream.kube_version)
            .or_else(|| own_kube_version.filter(|v| !v.is_empty()))
            .or_else(|| non_empty(&upstream.chart_metadata.kube_version));
        if let Some(kube_version) = kube_version {
            set.push((annotations::KUBE_VERSION, kube_version));
        }

        set
    }
}

/// Keep the featured annotation on exactly one chart of the package
///
/// The value carried by existing charts moves to one of the new charts.
pub fn ensure_featured(
    existing: &mut [TrackedChart],
    new: &mut [TrackedChart],
    placement: FeaturedPlacement,
) -> Result<()> {
    let mut value: Option<String> = None;
    for tracked in existing.iter() {
        let Some(current) = tracked
            .chart
            .annotation(annotations::FEATURED)
            .filter(|v| !v.is_empty())
        else {
            continue;
        };
        match &value {
            Some(first) if first != current => {
                return Err(RepoError::FeaturedConflict {
                    first: first.clone(),
                    second: current.to_string(),
                });
            }
            _ => value = Some(current.to_string()),
        }
    }

    let Some(value) = value else {
        return Ok(());
    };

    let target = match placement {
        FeaturedPlacement::LastFetched => new.last_mut(),
        FeaturedPlacement::HighestVersion => new
            .iter_mut()
            .max_by_key(|tracked| parse_lenient(tracked.chart.version()).ok()),
    };
    let Some(target) = target else {
        tracing::debug!("No new charts to carry featured annotation {}", value);
        return Ok(());
    };
    target.annotate(annotations::FEATURED, &value, true);

    for tracked in existing.iter_mut() {
        tracked.deannotate(annotations::FEATURED, Some(value.as_str()));
    }

    Ok(())
}
