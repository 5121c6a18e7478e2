//! Reconciliation runs
//!
//! Drives the selector, the fetchers, the integrator and the chart store for
//! every package, and optionally commits the result.

use chartkeeper_core::{Package, Paths, list_packages};

use crate::config::RepositoryConfig;
use crate::error::{RepoError, Result};
use crate::http::HttpClient;
use crate::icons::IconStore;
use crate::index::{ChartEntry, RepositoryIndex, compare_descending};
use crate::integrate::Integrator;
use crate::select::select_versions;
use crate::store;
use crate::upstream::{self, Endpoints, SourceMetadata};
use crate::vcs;

/// A package with its upstream resolved and the versions to fetch selected
#[derive(Debug, Clone)]
pub struct PackageUpdate {
    pub package: Package,
    pub source: SourceMetadata,
    /// Versions selected for fetching, newest first per stream
    pub fetch: Vec<ChartEntry>,
    /// Newest version already in `index.yaml`
    pub latest_stored: Option<ChartEntry>,
}

impl PackageUpdate {
    pub fn has_updates(&self) -> bool {
        !self.fetch.is_empty()
    }

    /// The package had no published version before this run
    pub fn is_addition(&self) -> bool {
        self.latest_stored.is_none()
    }
}

/// Outcome of staging changes
#[derive(Debug, Default)]
pub struct StageReport {
    /// Packages whose new versions were written
    pub applied: Vec<PackageUpdate>,
    /// Names of packages that failed
    pub skipped: Vec<String>,
}

impl StageReport {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.skipped.is_empty()
    }
}

/// Reconciles the packages of one repository with their upstreams
pub struct Reconciler {
    paths: Paths,
    config: RepositoryConfig,
    client: HttpClient,
    endpoints: Endpoints,
    icons: IconStore,
}

impl Reconciler {
    pub fn new(paths: Paths, config: RepositoryConfig) -> Result<Self> {
        Ok(Self {
            icons: IconStore::new(paths.clone()),
            client: HttpClient::new()?,
            endpoints: Endpoints::default(),
            paths,
            config,
        })
    }

    /// Use other Artifact Hub and GitHub API bases
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Resolve the upstream of a package and select the versions to fetch
    pub async fn populate(&self, package: Package, index: &RepositoryIndex) -> Result<PackageUpdate> {
        let upstream = &package.upstream;
        let source = upstream::fetch_upstream(upstream, &self.client, &self.endpoints).await?;
        if let Some(first) = source.versions.first()
            && first.name() != package.name
        {
            tracing::warn!(
                "upstream name {:?} does not match package name {:?}",
                first.name(),
                package.name
            );
        }

        let mut stored: Vec<ChartEntry> = index.get(&package.name).cloned().unwrap_or_default();
        stored.sort_by(compare_descending);

        let fetch = select_versions(
            &package.name,
            &source.versions,
            upstream.fetch,
            &upstream.tracked_streams()?,
            upstream.package_version,
            &stored,
        )?;

        Ok(PackageUpdate {
            latest_stored: stored.into_iter().next(),
            package,
            source,
            fetch,
        })
    }

    /// Populate every package, or only `only` (`<vendor>/<name>`)
    ///
    /// Packages that fail to populate are logged and left out.
    pub async fn populate_all(&self, only: Option<&str>) -> Result<Vec<PackageUpdate>> {
        let packages = list_packages(&self.paths, only)?;
        let index = RepositoryIndex::load_or_default(&self.paths.index_yaml)?;

        let mut updates = Vec::with_capacity(packages.len());
        for package in packages {
            let full_name = package.full_name();
            tracing::debug!("Populating package from {}", self.paths.relative(&package.path).display());
            let update = match self.populate(package, &index).await {
                Ok(update) => update,
                Err(e) => {
                    tracing::error!("failed to populate {}: {}", full_name, e);
                    continue;
                }
            };

            tracing::info!("Parsed {}", full_name);
            if !update.has_updates() {
                tracing::info!("{} is up-to-date", full_name);
            }
            for entry in &update.fetch {
                tracing::info!(
                    "Source: {} Vendor: {} Chart: {} Version: {} URL: {}",
                    update.source.source,
                    update.package.display_vendor,
                    update.package.name,
                    entry.version(),
                    entry.download_url().unwrap_or_default()
                );
            }
            updates.push(update);
        }

        Ok(updates)
    }

    /// Fetch, integrate and write the selected versions of one package
    pub async fn apply_updates(&self, update: &PackageUpdate) -> Result<()> {
        let package = &update.package;
        tracing::debug!("Applying updates for package {}", package.full_name());

        let mut existing = store::load_existing_charts(&self.paths, package)?;

        let mut new = Vec::with_capacity(update.fetch.len());
        for entry in &update.fetch {
            let mut chart = upstream::load_chart(&self.client, &update.source, entry)
                .await
                .map_err(|e| e.for_chart("fetch", entry.name(), entry.version()))?;
            chart.metadata.version = entry.version().to_string();
            new.push(chart);
        }

        let overlay_files = package.overlay_files()?;
        let integrator = Integrator {
            package,
            overlay_files: &overlay_files,
            icons: &self.icons,
            fetcher: &self.client,
            placement: self.config.featured_placement,
        };
        let integrated = integrator.integrate(&mut existing, new).await?;

        existing.extend(integrated);
        store::write_charts(&self.paths, package, &existing)
    }

    /// Bring every package up to date on disk and regenerate `index.yaml`
    ///
    /// Fails when every package with updates failed.
    pub async fn stage(&self, only: Option<&str>) -> Result<StageReport> {
        let updates: Vec<PackageUpdate> = self
            .populate_all(only)
            .await?
            .into_iter()
            .filter(PackageUpdate::has_updates)
            .collect();

        let mut report = StageReport::default();
        if updates.is_empty() {
            return Ok(report);
        }

        let total = updates.len();
        for update in updates {
            match self.apply_updates(&update).await {
                Ok(()) => report.applied.push(update),
                Err(e) => {
                    tracing::error!(
                        "failed to apply updates for chart {:?}: {}",
                        update.package.name,
                        e
                    );
                    report.skipped.push(update.package.name.clone());
                }
            }
        }

        if !report.skipped.is_empty() {
            tracing::error!("Skipped due to error: {}", report.skipped.join(", "));
        }
        if report.skipped.len() >= total {
            return Err(RepoError::AllPackagesFailed { count: total });
        }

        store::write_index(&self.paths, &self.icons)?;
        Ok(report)
    }

    /// Commit what `stage` wrote and check nothing was left behind
    pub fn commit(&self, report: &StageReport) -> Result<Option<String>> {
        if report.applied.is_empty() {
            tracing::info!("Nothing to commit");
            return Ok(None);
        }
        tracing::info!("Committing changes");

        let mut pathspecs = vec!["index.yaml".to_string(), "assets/icons".to_string()];
        for update in &report.applied {
            let (vendor, name) = (&update.package.vendor, &update.package.name);
            pathspecs.push(format!("assets/{}", vendor));
            pathspecs.push(format!("charts/{}/{}", vendor, name));
            pathspecs.push(format!("packages/{}/{}", vendor, name));
        }

        let commit = vcs::commit_paths(&self.paths.root, &pathspecs, &commit_message(&report.applied))?;
        vcs::ensure_clean(&self.paths.root)?;
        Ok(Some(commit))
    }
}

/// `Charts CI` commit message listing added and updated packages
pub fn commit_message(updates: &[PackageUpdate]) -> String {
    let mut sorted: Vec<&PackageUpdate> = updates.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.package.vendor, &a.package.name).cmp(&(&b.package.vendor, &b.package.name))
    });

    let mut additions = String::new();
    let mut updated = String::new();
    for update in sorted {
        let mut item = format!("  {}:\n", update.package.full_name());
        for entry in &update.fetch {
            item.push_str(&format!("    - {}\n", entry.version()));
        }
        if update.is_addition() {
            additions.push_str(&item);
        } else {
            updated.push_str(&item);
        }
    }

    let mut message = String::from("Charts CI\n```");
    if !additions.is_empty() {
        message.push_str("\nAdded:\n");
        message.push_str(&additions);
    }
    if !updated.is_empty() {
        message.push_str("\nUpdated:\n");
        message.push_str(&updated);
    }
    message.push_str("```");
    message
}
