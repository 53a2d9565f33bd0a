//! Change sets and the source providers that serve them
//!
//! A [`SourceProvider`] turns a change set into a list of per-file tasks
//! and reads file content on demand. The working tree backs full walks and
//! explicit change lists; a git revision backs diffs between commits.

use crate::common::{check_file, normalize_path, Exclusion};
use crate::report::FileFailure;
use async_trait::async_trait;
use codegraph_core::entities::FileIndexEntry;
use codegraph_core::error::{Error, Result};
use codegraph_watcher::{FileChange, GitRepository};
use ignore::WalkBuilder;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which files a reconciliation looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSet {
    /// Walk the whole workspace; indexed files no longer found are deletions
    Full,
    /// Paths reported by a watcher or a caller, absolute or workspace-relative
    Explicit(Vec<FileChange>),
    /// Files changed between two revisions; `from = None` means every file
    /// of `to`
    GitDiff { from: Option<String>, to: String },
}

/// Work for one workspace-relative path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileTask {
    Upsert(String),
    Delete(String),
}

impl FileTask {
    pub fn path(&self) -> &str {
        match self {
            Self::Upsert(path) | Self::Delete(path) => path,
        }
    }
}

#[derive(Debug, Default)]
pub struct SourcePlan {
    pub tasks: Vec<FileTask>,
    /// Paths that could not be taken into the workspace
    pub rejected: Vec<FileFailure>,
}

/// Result of reading one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Content(Vec<u8>),
    /// Not present on disk (or in the revision); its index state is retracted
    Missing,
    Excluded(Exclusion),
}

/// Yields the files of a change set and their content
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Tasks for this change set; `known` is the current file index
    async fn plan(&self, known: &[FileIndexEntry]) -> Result<SourcePlan>;

    async fn read(&self, path: &str) -> Result<FileContent>;
}

/// Build the provider serving `change_set` under `root`
pub fn source_for(
    root: &Path,
    change_set: ChangeSet,
    max_file_size: u64,
    respect_gitignore: bool,
) -> Result<Box<dyn SourceProvider>> {
    match change_set {
        ChangeSet::Full => Ok(Box::new(WorkspaceSource::full(
            root,
            max_file_size,
            respect_gitignore,
        ))),
        ChangeSet::Explicit(changes) => Ok(Box::new(WorkspaceSource::explicit(
            root,
            changes,
            max_file_size,
        ))),
        ChangeSet::GitDiff { from, to } => Ok(Box::new(GitDiffSource::open(
            root,
            from,
            to,
            max_file_size,
        )?)),
    }
}

/// Collect tasks per path, later changes overriding earlier ones
#[derive(Default)]
struct TaskSet {
    tasks: BTreeMap<String, FileTask>,
    rejected: Vec<FileFailure>,
}

impl TaskSet {
    fn add(&mut self, result: Result<String>, raw: &Path, delete: bool) {
        match result {
            Ok(path) => {
                let task = if delete {
                    FileTask::Delete(path.clone())
                } else {
                    FileTask::Upsert(path.clone())
                };
                self.tasks.insert(path, task);
            }
            Err(e) => self
                .rejected
                .push(FileFailure::new(raw.display().to_string(), &e)),
        }
    }

    fn add_change(&mut self, change: &FileChange, to_workspace: impl Fn(&Path) -> Result<String>) {
        for path in change.removed_paths() {
            self.add(to_workspace(path), path, true);
        }
        for path in change.written_paths() {
            self.add(to_workspace(path), path, false);
        }
    }

    fn into_plan(self) -> SourcePlan {
        SourcePlan {
            tasks: self.tasks.into_values().collect(),
            rejected: self.rejected,
        }
    }
}

enum Scope {
    Full { respect_gitignore: bool },
    Explicit(Vec<FileChange>),
}

/// Files read from the working tree
pub struct WorkspaceSource {
    root: PathBuf,
    scope: Scope,
    max_file_size: u64,
}

impl WorkspaceSource {
    pub fn full(root: &Path, max_file_size: u64, respect_gitignore: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            scope: Scope::Full { respect_gitignore },
            max_file_size,
        }
    }

    pub fn explicit(root: &Path, changes: Vec<FileChange>, max_file_size: u64) -> Self {
        Self {
            root: root.to_path_buf(),
            scope: Scope::Explicit(changes),
            max_file_size,
        }
    }

    async fn walk(&self, respect_gitignore: bool) -> Result<Vec<String>> {
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let walker = WalkBuilder::new(&root)
                .standard_filters(true)
                .git_ignore(respect_gitignore)
                .git_global(respect_gitignore)
                .git_exclude(respect_gitignore)
                .require_git(false)
                .follow_links(false)
                .build();
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!(error = %e, "Skipping unreadable walk entry");
                        continue;
                    }
                };
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                if let Ok(path) = normalize_path(&root, entry.path()) {
                    files.push(path);
                }
            }
            files
        })
        .await
        .map_err(|e| Error::Other(anyhow::anyhow!("workspace walk panicked: {e}")))?;

        info!(files = files.len(), root = %self.root.display(), "Walked workspace");
        Ok(files)
    }
}

#[async_trait]
impl SourceProvider for WorkspaceSource {
    async fn plan(&self, known: &[FileIndexEntry]) -> Result<SourcePlan> {
        let mut set = TaskSet::default();
        match &self.scope {
            Scope::Full { respect_gitignore } => {
                let seen: BTreeSet<String> = self.walk(*respect_gitignore).await?.into_iter().collect();
                for entry in known {
                    if !seen.contains(&entry.path) {
                        set.tasks
                            .insert(entry.path.clone(), FileTask::Delete(entry.path.clone()));
                    }
                }
                for path in seen {
                    set.tasks.insert(path.clone(), FileTask::Upsert(path));
                }
            }
            Scope::Explicit(changes) => {
                for change in changes {
                    set.add_change(change, |p| normalize_path(&self.root, p));
                }
            }
        }
        Ok(set.into_plan())
    }

    async fn read(&self, path: &str) -> Result<FileContent> {
        let full = self.root.join(path);
        match check_file(&full, self.max_file_size) {
            Ok(Some(exclusion)) => return Ok(FileContent::Excluded(exclusion)),
            Ok(None) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileContent::Missing),
            Err(e) => return Err(Error::Io(e)),
        }
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(FileContent::Content(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileContent::Missing),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Files read from the blobs of a target revision
pub struct GitDiffSource {
    root: PathBuf,
    repo: GitRepository,
    /// Workspace root relative to the repository root
    prefix: PathBuf,
    from: Option<String>,
    to: String,
    max_file_size: u64,
}

impl GitDiffSource {
    pub fn open(root: &Path, from: Option<String>, to: String, max_file_size: u64) -> Result<Self> {
        let repo = GitRepository::open(root)?;
        let canonical_root = root.canonicalize().map_err(Error::Io)?;
        let canonical_repo = repo.root_path().canonicalize().map_err(Error::Io)?;
        let prefix = canonical_root
            .strip_prefix(&canonical_repo)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self {
            root: root.to_path_buf(),
            repo,
            prefix,
            from,
            to,
            max_file_size,
        })
    }

    /// Workspace-relative form of a repository-relative path
    fn to_workspace(&self, repo_relative: &Path) -> Result<String> {
        let relative = repo_relative.strip_prefix(&self.prefix).map_err(|_| {
            Error::invalid_input(format!(
                "{} is outside the workspace {}",
                repo_relative.display(),
                self.root.display()
            ))
        })?;
        normalize_path(&self.root, relative)
    }
}

#[async_trait]
impl SourceProvider for GitDiffSource {
    async fn plan(&self, _known: &[FileIndexEntry]) -> Result<SourcePlan> {
        let repo = self.repo.clone();
        let from = self.from.clone();
        let to = self.to.clone();
        let changes = tokio::task::spawn_blocking(move || {
            repo.changed_files_between(from.as_deref(), &to)
        })
        .await
        .map_err(|e| Error::Other(anyhow::anyhow!("git diff task panicked: {e}")))??;

        let mut set = TaskSet::default();
        // A workspace nested in a larger repository only sees its own subtree
        let in_scope = |change: &FileChange| {
            change
                .removed_paths()
                .into_iter()
                .chain(change.written_paths())
                .any(|p| p.starts_with(&self.prefix))
        };
        for change in changes.iter().filter(|c| in_scope(c)) {
            set.add_change(change, |p| self.to_workspace(p));
        }
        Ok(set.into_plan())
    }

    async fn read(&self, path: &str) -> Result<FileContent> {
        let repo = self.repo.clone();
        let rev = self.to.clone();
        let repo_relative = self.prefix.join(path);
        let blob = tokio::task::spawn_blocking(move || repo.read_file_at(&rev, &repo_relative))
            .await
            .map_err(|e| Error::Other(anyhow::anyhow!("git read task panicked: {e}")))??;

        Ok(match blob {
            None => FileContent::Missing,
            Some(bytes) if bytes.len() as u64 > self.max_file_size => {
                FileContent::Excluded(Exclusion::TooLarge)
            }
            Some(bytes) => FileContent::Content(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn entry(path: &str) -> FileIndexEntry {
        FileIndexEntry {
            path: path.to_string(),
            fingerprint: "fp".to_string(),
            language: codegraph_core::entities::Language::Python,
            node_ids: Default::default(),
            edge_ids: Default::default(),
            degraded: false,
        }
    }

    #[tokio::test]
    async fn test_full_walk_plans_upserts_and_missing_deletions() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("a.py"), "def a(): pass\n").unwrap();
        fs::write(dir.path().join("pkg/b.py"), "def b(): pass\n").unwrap();

        let source = WorkspaceSource::full(dir.path(), 1024, true);
        let plan = source.plan(&[entry("gone.py"), entry("a.py")]).await.unwrap();

        assert_eq!(
            plan.tasks,
            vec![
                FileTask::Upsert("a.py".to_string()),
                FileTask::Delete("gone.py".to_string()),
                FileTask::Upsert("pkg/b.py".to_string()),
            ]
        );
        assert!(plan.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_full_walk_honours_gitignore() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".gitignore"), "build/\n").unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/gen.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("main.py"), "x = 1\n").unwrap();

        let plan = WorkspaceSource::full(dir.path(), 1024, true)
            .plan(&[])
            .await
            .unwrap();
        let paths: Vec<&str> = plan.tasks.iter().map(FileTask::path).collect();
        assert!(paths.contains(&"main.py"));
        assert!(!paths.contains(&"build/gen.py"));
    }

    #[tokio::test]
    async fn test_explicit_changes_normalize_and_reject() {
        let dir = TempDir::new().unwrap();
        let changes = vec![
            FileChange::Modified(dir.path().join("src/a.py")),
            FileChange::Renamed {
                from: PathBuf::from("old.py"),
                to: PathBuf::from("./new.py"),
            },
            FileChange::Added(PathBuf::from("../escape.py")),
        ];
        let plan = WorkspaceSource::explicit(dir.path(), changes, 1024)
            .plan(&[])
            .await
            .unwrap();

        assert_eq!(
            plan.tasks,
            vec![
                FileTask::Upsert("new.py".to_string()),
                FileTask::Delete("old.py".to_string()),
                FileTask::Upsert("src/a.py".to_string()),
            ]
        );
        assert_eq!(plan.rejected.len(), 1);
        assert_eq!(plan.rejected[0].kind, "invalid_input");
    }

    #[tokio::test]
    async fn test_read_reports_missing_and_excluded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("small.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("big.py"), "x = 1\n".repeat(100)).unwrap();
        let source = WorkspaceSource::full(dir.path(), 64, true);

        assert_eq!(
            source.read("small.py").await.unwrap(),
            FileContent::Content(b"x = 1\n".to_vec())
        );
        assert_eq!(
            source.read("big.py").await.unwrap(),
            FileContent::Excluded(Exclusion::TooLarge)
        );
        assert_eq!(source.read("none.py").await.unwrap(), FileContent::Missing);
    }
}
