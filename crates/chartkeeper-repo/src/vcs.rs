//! Git operations through libgit2
//!
//! Clones for git upstreams and release validation, and the commit made by
//! `auto`.

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{FetchOptions, IndexAddOption, Oid, Repository, Signature, StatusOptions};
use std::path::Path;

use crate::error::{RepoError, Result};

const FALLBACK_NAME: &str = "chartkeeper";
const FALLBACK_EMAIL: &str = "chartkeeper@localhost";

/// Clone `url` into `dir`, optionally a single branch and only its tip
pub fn clone(url: &str, branch: Option<&str>, shallow: bool, dir: &Path) -> Result<Repository> {
    tracing::debug!("Cloning {} into {}", url, dir.display());

    let mut fetch = FetchOptions::new();
    // libgit2's local transport rejects depth
    if shallow && !is_local(url) {
        fetch.depth(1);
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch);
    if let Some(branch) = branch.filter(|b| !b.is_empty()) {
        builder.branch(branch);
    }

    Ok(builder.clone(url, dir)?)
}

/// Clone only the tip of `branch`
pub fn shallow_clone(url: &str, branch: &str, dir: &Path) -> Result<Repository> {
    clone(url, Some(branch), true, dir)
}

fn is_local(url: &str) -> bool {
    url.starts_with("file://") || Path::new(url).exists()
}

/// Detach HEAD at `commit` and force the work tree to match it
pub fn checkout_commit(repo: &Repository, commit: &str) -> Result<()> {
    let oid = Oid::from_str(commit)?;
    let object = repo.find_commit(oid)?;
    repo.checkout_tree(object.as_object(), Some(CheckoutBuilder::new().force()))?;
    repo.set_head_detached(oid)?;
    Ok(())
}

/// SHA of the commit HEAD points at
pub fn head_commit(repo: &Repository) -> Result<String> {
    let commit = repo.head()?.peel_to_commit()?;
    Ok(commit.id().to_string())
}

/// Stage `paths` (relative to the repository root, deletions included) and commit them on HEAD
pub fn commit_paths(root: &Path, paths: &[String], message: &str) -> Result<String> {
    let repo = Repository::open(root)?;
    let mut index = repo.index()?;
    index.add_all(paths.iter().map(String::as_str), IndexAddOption::DEFAULT, None)?;
    index.update_all(paths.iter().map(String::as_str), None)?;
    index.write()?;

    let tree = repo.find_tree(index.write_tree()?)?;
    let signature = match repo.signature() {
        Ok(signature) => signature,
        Err(e) => {
            tracing::debug!("No git identity configured ({}), using {}", e, FALLBACK_NAME);
            Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?
        }
    };

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch || e.code() == git2::ErrorCode::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    tracing::info!("Committed {}", oid);
    Ok(oid.to_string())
}

/// Fail when the work tree has uncommitted changes
pub fn ensure_clean(root: &Path) -> Result<()> {
    let repo = Repository::open(root)?;
    let mut options = StatusOptions::new();
    options.include_untracked(true).recurse_untracked_dirs(true);
    let statuses = repo.statuses(Some(&mut options))?;

    let dirty: Vec<String> = statuses
        .iter()
        .filter_map(|entry| entry.path().map(str::to_string))
        .collect();
    if !dirty.is_empty() {
        return Err(RepoError::DirtyWorkTree {
            paths: dirty.join(", "),
        });
    }
    Ok(())
}
