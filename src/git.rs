//! Repository operations run by the CLI after version work completes.
//!
//! These are collaborators of the coordinator, not part of it: committing the
//! written manifests, creating release branches and reporting status.

use anyhow::{bail, Context, Result};
use git2::{BranchType, Commit, Oid, Repository, Signature};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Git status of a module folder.
#[derive(Debug, Clone, Serialize)]
pub struct GitStatus {
    pub folder: PathBuf,
    pub branch: String,
    pub is_dirty: bool,
    pub dirty_files: Vec<String>,
}

/// Read the branch of the repository containing `folder` and the dirty files
/// below `folder`.
pub fn status(folder: &Path) -> Result<GitStatus> {
    let repo = open(folder)?;
    let prefix = folder_in_workdir(&repo, folder)?;

    let branch = match repo.head() {
        Ok(head) => head.shorthand().unwrap_or("(detached)").to_string(),
        Err(_) => "(unborn)".to_string(),
    };

    let statuses = repo.statuses(None).context("Failed to read git status")?;
    let dirty_files: Vec<String> = statuses
        .iter()
        .filter_map(|s| s.path().map(String::from))
        .filter(|path| Path::new(path).starts_with(&prefix))
        .collect();

    Ok(GitStatus {
        folder: folder.to_path_buf(),
        branch,
        is_dirty: !dirty_files.is_empty(),
        dirty_files,
    })
}

/// Whether `folder` lives inside a git work tree.
pub fn is_repository(folder: &Path) -> bool {
    Repository::discover(folder).is_ok()
}

/// Stage `paths` and commit them on HEAD.
///
/// Returns `None` when the staged tree equals HEAD's tree.
pub fn commit_paths(folder: &Path, paths: &[PathBuf], message: &str) -> Result<Option<Oid>> {
    let repo = open(folder)?;
    let workdir = repo
        .workdir()
        .context("Cannot commit in a bare repository")?;
    let workdir = std::fs::canonicalize(workdir)
        .with_context(|| format!("Failed to resolve {}", workdir.display()))?;

    let mut index = repo.index().context("Failed to open index")?;
    for path in paths {
        let absolute = std::fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        let relative = absolute.strip_prefix(&workdir).with_context(|| {
            format!(
                "{} is outside of {}",
                absolute.display(),
                workdir.display()
            )
        })?;
        index
            .add_path(relative)
            .with_context(|| format!("Failed to stage {}", relative.display()))?;
    }
    index.write().context("Failed to write index")?;

    let tree_id = index.write_tree().context("Failed to write tree")?;
    let tree = repo.find_tree(tree_id)?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit().context("HEAD is not a commit")?),
        Err(_) => None,
    };
    if let Some(parent) = &parent {
        if parent.tree_id() == tree_id {
            return Ok(None);
        }
    }

    let signature = signature(&repo)?;
    let parents: Vec<&Commit> = parent.iter().collect();
    let oid = repo
        .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .context("Failed to create commit")?;

    tracing::info!(folder = %folder.display(), commit = %oid, "committed manifests");
    Ok(Some(oid))
}

/// Point HEAD at a branch named `label` created from the current commit.
///
/// An existing branch is reused only when it already points at HEAD's commit,
/// so the work tree never silently diverges from the branch.
pub fn switch_to_release_branch(folder: &Path, label: &str) -> Result<()> {
    let repo = open(folder)?;
    let head = repo
        .head()
        .context("Repository has no commits to branch from")?
        .peel_to_commit()
        .context("HEAD is not a commit")?;

    let branch = match repo.find_branch(label, BranchType::Local) {
        Ok(existing) => {
            if existing.get().target() != Some(head.id()) {
                bail!(
                    "Branch '{}' already exists in {} at a different commit",
                    label,
                    folder.display()
                );
            }
            existing
        }
        Err(_) => repo
            .branch(label, &head, false)
            .with_context(|| format!("Failed to create branch '{}'", label))?,
    };

    let refname = branch
        .get()
        .name()
        .context("Branch name is not valid UTF-8")?
        .to_string();
    repo.set_head(&refname)
        .with_context(|| format!("Failed to switch to {}", refname))?;

    Ok(())
}

/// Create (or reuse) the release branch `label` and commit `paths` on it.
pub fn commit_release(folder: &Path, label: &str, paths: &[PathBuf]) -> Result<Option<Oid>> {
    switch_to_release_branch(folder, label)?;
    commit_paths(folder, paths, &format!("Release {}", label))
}

/// `folder` relative to the work tree root; empty for the root itself.
fn folder_in_workdir(repo: &Repository, folder: &Path) -> Result<PathBuf> {
    let Some(workdir) = repo.workdir() else {
        return Ok(PathBuf::new());
    };
    let workdir = std::fs::canonicalize(workdir)
        .with_context(|| format!("Failed to resolve {}", workdir.display()))?;
    let folder = std::fs::canonicalize(folder)
        .with_context(|| format!("Failed to resolve {}", folder.display()))?;
    Ok(folder
        .strip_prefix(&workdir)
        .map(Path::to_path_buf)
        .unwrap_or_default())
}

fn open(folder: &Path) -> Result<Repository> {
    Repository::discover(folder)
        .with_context(|| format!("Failed to open git repository at {}", folder.display()))
}

fn signature(repo: &Repository) -> Result<Signature<'static>> {
    match repo.signature() {
        Ok(sig) => Ok(sig.to_owned()),
        Err(_) => Signature::now("mothership", "mothership@localhost")
            .context("Failed to build commit signature"),
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
