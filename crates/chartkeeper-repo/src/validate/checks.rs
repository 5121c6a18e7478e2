//! Structural checks of the repository

use std::collections::{BTreeMap, BTreeSet};

use chartkeeper_core::package::{OVERLAY_DIR, UPSTREAM_YAML};
use chartkeeper_core::{Package, Paths, list_packages};

use crate::config::RepositoryConfig;
use crate::error::RepoError;
use crate::icons::strip_local_scheme;
use crate::index::RepositoryIndex;

fn failure(message: impl Into<String>) -> RepoError {
    RepoError::Validation {
        message: message.into(),
    }
}

/// Chart names are not namespaced by vendor, so package names must be unique
pub fn duplicate_package_names(paths: &Paths, _config: &RepositoryConfig) -> Vec<RepoError> {
    match list_packages(paths, None) {
        Ok(packages) => find_duplicate_names(&packages),
        Err(e) => vec![failure(format!("failed to list packages: {}", e))],
    }
}

fn find_duplicate_names(packages: &[Package]) -> Vec<RepoError> {
    let mut seen: BTreeMap<&str, String> = BTreeMap::new();
    let mut errors = Vec::new();
    for package in packages {
        match seen.get(package.name.as_str()) {
            Some(existing) => errors.push(failure(format!(
                "duplicate package names {} and {}",
                existing,
                package.full_name()
            ))),
            None => {
                seen.insert(&package.name, package.full_name());
            }
        }
    }
    errors
}

/// Every package has charts in `index.yaml` and every chart has a package
pub fn index_and_packages_names_match(paths: &Paths, _config: &RepositoryConfig) -> Vec<RepoError> {
    let index = match RepositoryIndex::load(&paths.index_yaml) {
        Ok(index) => index,
        Err(e) => return vec![failure(format!("failed to read index.yaml: {}", e))],
    };
    match list_packages(paths, None) {
        Ok(packages) => match_package_names(&index, &packages),
        Err(e) => vec![failure(format!("failed to list packages: {}", e))],
    }
}

fn match_package_names(index: &RepositoryIndex, packages: &[Package]) -> Vec<RepoError> {
    let mut unmatched: BTreeSet<&str> = index.entries.keys().map(String::as_str).collect();
    let mut errors = Vec::new();

    for package in packages {
        if !unmatched.remove(package.name.as_str()) && !index.entries.contains_key(&package.name) {
            errors.push(failure(format!(
                "chart name {:?} is present in packages/ but not in index.yaml",
                package.name
            )));
        }
    }
    for name in unmatched {
        errors.push(failure(format!(
            "chart name {:?} is present in index.yaml but not in packages/",
            name
        )));
    }
    errors
}

/// Index icons exist in `assets/icons` and every stored icon is used
pub fn icons_referenced(paths: &Paths, _config: &RepositoryConfig) -> Vec<RepoError> {
    let index = match RepositoryIndex::load(&paths.index_yaml) {
        Ok(index) => index,
        Err(e) => return vec![failure(format!("failed to load index.yaml: {}", e))],
    };

    let entries = match std::fs::read_dir(&paths.icons) {
        Ok(entries) => entries,
        Err(e) => return vec![failure(format!("failed to read icons directory: {}", e))],
    };
    let mut icon_files = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => icon_files.push(format!(
                "assets/icons/{}",
                entry.file_name().to_string_lossy()
            )),
            Err(e) => return vec![failure(format!("failed to read icons directory: {}", e))],
        }
    }

    validate_loaded_icons(&index, &icon_files)
}

fn validate_loaded_icons(index: &RepositoryIndex, icon_files: &[String]) -> Vec<RepoError> {
    let mut referenced: BTreeMap<&str, bool> =
        icon_files.iter().map(|f| (f.as_str(), false)).collect();
    let mut errors = Vec::new();

    for entry in index.entries.values().flatten() {
        let icon = entry.metadata.icon.as_deref().unwrap_or_default();
        let file = strip_local_scheme(icon).unwrap_or(icon);
        match referenced.get_mut(file) {
            Some(used) => *used = true,
            None => errors.push(failure(format!(
                "icon file {} for {} version {} does not exist",
                file,
                entry.name(),
                entry.version()
            ))),
        }
    }

    for (file, used) in referenced {
        if !used {
            errors.push(failure(format!(
                "icon file {} is not referenced in index.yaml",
                file
            )));
        }
    }
    errors
}

/// `packages/<vendor>/<name>/` holds only `upstream.yaml` and `overlay/`
pub fn packages_directory_layout(paths: &Paths, _config: &RepositoryConfig) -> Vec<RepoError> {
    let mut errors = Vec::new();
    if !paths.packages.is_dir() {
        return errors;
    }

    let walker = walkdir::WalkDir::new(&paths.packages)
        .min_depth(1)
        .max_depth(3)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                errors.push(failure(format!("failed to walk packages directory: {}", e)));
                continue;
            }
        };
        let path = entry.path();
        let is_dir = entry.file_type().is_dir();

        if entry.depth() < 3 {
            if !is_dir {
                let parent = path.parent().unwrap_or(&paths.packages);
                errors.push(failure(format!(
                    "{} may contain only directories, but {} is not a directory",
                    parent.display(),
                    path.display()
                )));
            }
            continue;
        }

        match entry.file_name().to_str() {
            Some(UPSTREAM_YAML) if is_dir => {
                errors.push(failure(format!("{} must be a file", path.display())))
            }
            Some(OVERLAY_DIR) if !is_dir => {
                errors.push(failure(format!("{} must be a directory", path.display())))
            }
            Some(UPSTREAM_YAML) | Some(OVERLAY_DIR) => {}
            _ => errors.push(failure(format!(
                "only upstream.yaml and overlay directory may exist in package directories but found {}",
                path.display()
            ))),
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ChartEntry;
    use chartkeeper_core::{ChartMetadata, UpstreamYaml};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn package(vendor: &str, name: &str) -> Package {
        Package {
            name: name.to_string(),
            vendor: vendor.to_string(),
            display_vendor: vendor.to_string(),
            display_name: name.to_string(),
            path: PathBuf::from(format!("packages/{}/{}", vendor, name)),
            upstream: UpstreamYaml::default(),
        }
    }

    fn index(entries: &[(&str, Option<&str>)]) -> RepositoryIndex {
        let mut index = RepositoryIndex::default();
        for (name, icon) in entries {
            index
                .entries
                .entry(name.to_string())
                .or_default()
                .push(ChartEntry {
                    metadata: ChartMetadata {
                        name: name.to_string(),
                        version: "1.0.0".to_string(),
                        icon: icon.map(str::to_string),
                        ..Default::default()
                    },
                    urls: vec![],
                    created: chrono::Utc::now(),
                    digest: String::new(),
                    removed: false,
                });
        }
        index
    }

    fn messages(errors: Vec<RepoError>) -> Vec<String> {
        errors.into_iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_find_duplicate_names() {
        let packages = [
            package("acme", "app"),
            package("globex", "app"),
            package("globex", "db"),
        ];
        assert_eq!(
            messages(find_duplicate_names(&packages)),
            vec!["duplicate package names acme/app and globex/app"]
        );
        assert!(find_duplicate_names(&packages[1..]).is_empty());
    }

    #[test]
    fn test_match_package_names() {
        let index = index(&[("app", None), ("orphan", None)]);
        let packages = [package("acme", "app"), package("acme", "new")];
        assert_eq!(
            messages(match_package_names(&index, &packages)),
            vec![
                "chart name \"new\" is present in packages/ but not in index.yaml",
                "chart name \"orphan\" is present in index.yaml but not in packages/",
            ]
        );
    }

    #[test]
    fn test_validate_loaded_icons() {
        let index = index(&[
            ("app", Some("file://assets/icons/app.png")),
            ("db", Some("file://assets/icons/db.svg")),
        ]);
        let icons = vec![
            "assets/icons/app.png".to_string(),
            "assets/icons/unused.png".to_string(),
        ];
        assert_eq!(
            messages(validate_loaded_icons(&index, &icons)),
            vec![
                "icon file assets/icons/db.svg for db version 1.0.0 does not exist",
                "icon file assets/icons/unused.png is not referenced in index.yaml",
            ]
        );
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_packages_directory_layout() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path());
        touch(temp.path(), "packages/acme/app/upstream.yaml");
        touch(temp.path(), "packages/acme/app/overlay/values.yaml");
        assert!(packages_directory_layout(&paths, &RepositoryConfig::default()).is_empty());

        touch(temp.path(), "packages/README.md");
        touch(temp.path(), "packages/acme/notes.txt");
        touch(temp.path(), "packages/acme/app/Chart.yaml");
        touch(temp.path(), "packages/acme/db/overlay");
        std::fs::create_dir_all(temp.path().join("packages/acme/db/upstream.yaml")).unwrap();

        let errors = messages(packages_directory_layout(&paths, &RepositoryConfig::default()));
        assert_eq!(errors.len(), 5, "{:?}", errors);
        assert!(errors.iter().any(|e| e.contains("README.md is not a directory")));
        assert!(errors.iter().any(|e| e.contains("notes.txt is not a directory")));
        assert!(errors.iter().any(|e| e.contains("but found") && e.contains("Chart.yaml")));
        assert!(errors.iter().any(|e| e.ends_with("overlay must be a directory")));
        assert!(errors.iter().any(|e| e.ends_with("upstream.yaml must be a file")));
    }
}
