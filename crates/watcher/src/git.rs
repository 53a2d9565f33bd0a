//! Git repository integration: commit diffs, blob reads and ignore rules
//!
//! A git diff between two commits is one of the change-set sources for
//! reconciliation. File content for a diff is read from the target commit's
//! blobs rather than from the working tree, so a diff can be reconciled
//! without checking it out.

use crate::events::FileChange;
use codegraph_core::error::{Error, Result};
use git2::{Delta, DiffFindOptions, Repository, Tree};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Handle to a repository on disk
///
/// `git2::Repository` is not `Sync`, so the handle stores only the paths
/// and opens the repository per call.
#[derive(Debug, Clone)]
pub struct GitRepository {
    /// Working directory root
    repo_path: PathBuf,
}

impl GitRepository {
    /// Open the repository containing `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::discover(path)
            .map_err(|e| Error::watcher(format!("Failed to open Git repository: {e}")))?;

        let repo_path = repo
            .workdir()
            .ok_or_else(|| Error::watcher("Repository has no working directory"))?
            .to_path_buf();
        debug!("Opened Git repository at {:?}", repo_path);

        Ok(Self { repo_path })
    }

    /// Working directory root
    pub fn root_path(&self) -> &Path {
        &self.repo_path
    }

    /// Whether git's ignore rules exclude `path` (absolute or repo-relative)
    pub fn should_ignore(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.repo_path).unwrap_or(path);
        if relative.is_absolute() {
            debug!("Path {:?} is outside repository", path);
            return false;
        }
        match self.open_repo() {
            Ok(repo) => repo.is_path_ignored(relative).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// File changes between two revisions, with repo-relative paths
    ///
    /// `from = None` diffs against the empty tree, so every file of `to`
    /// shows up as added. Renames are detected; type changes count as
    /// modifications and copies as additions.
    pub fn changed_files_between(&self, from: Option<&str>, to: &str) -> Result<Vec<FileChange>> {
        let repo = self.open_repo()?;
        let to_tree = Self::resolve_tree(&repo, to)?;
        let from_tree = from
            .map(|rev| Self::resolve_tree(&repo, rev))
            .transpose()?;

        let mut diff = repo
            .diff_tree_to_tree(from_tree.as_ref(), Some(&to_tree), None)
            .map_err(|e| Error::watcher(format!("Failed to compute diff: {e}")))?;
        let mut find_options = DiffFindOptions::new();
        find_options.renames(true);
        diff.find_similar(Some(&mut find_options))
            .map_err(|e| Error::watcher(format!("Failed to detect renames: {e}")))?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let old_path = delta.old_file().path().map(Path::to_path_buf);
            let new_path = delta.new_file().path().map(Path::to_path_buf);
            let change = match (delta.status(), old_path, new_path) {
                (Delta::Added | Delta::Copied, _, Some(path)) => FileChange::Added(path),
                (Delta::Modified | Delta::Typechange, _, Some(path)) => FileChange::Modified(path),
                (Delta::Deleted, Some(path), _) => FileChange::Deleted(path),
                (Delta::Renamed, Some(from), Some(to)) => FileChange::Renamed { from, to },
                _ => continue,
            };
            changes.push(change);
        }

        info!(
            from = from.unwrap_or("<empty>"),
            to,
            changes = changes.len(),
            "Computed changed files between revisions"
        );
        Ok(changes)
    }

    /// Content of `path` (repo-relative) at `rev`; `None` when the path is
    /// absent from that revision or is not a file
    pub fn read_file_at(&self, rev: &str, path: &Path) -> Result<Option<Vec<u8>>> {
        let repo = self.open_repo()?;
        let tree = Self::resolve_tree(&repo, rev)?;
        let entry = match tree.get_path(path) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::watcher(format!(
                    "Failed to look up {} at {rev}: {e}",
                    path.display()
                )))
            }
        };
        if entry.kind() != Some(git2::ObjectType::Blob) {
            return Ok(None);
        }
        let blob = repo
            .find_blob(entry.id())
            .map_err(|e| Error::watcher(format!("Failed to read blob: {e}")))?;
        Ok(Some(blob.content().to_vec()))
    }

    fn resolve_tree<'r>(repo: &'r Repository, rev: &str) -> Result<Tree<'r>> {
        repo.revparse_single(rev)
            .and_then(|object| object.peel_to_tree())
            .map_err(|e| Error::watcher(format!("Failed to resolve revision {rev}: {e}")))
    }

    fn open_repo(&self) -> Result<Repository> {
        Repository::open(&self.repo_path)
            .map_err(|e| Error::watcher(format!("Failed to open repository: {e}")))
    }
}
