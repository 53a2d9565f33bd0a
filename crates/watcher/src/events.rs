//! File change event types
//!
//! A [`FileChange`] is what every change source (the live watcher, a git
//! diff, an explicit list) hands to reconciliation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// One file-level change
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileChange {
    Added(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    /// A move; reconciled as a deletion of `from` plus an addition of `to`
    Renamed { from: PathBuf, to: PathBuf },
}

impl FileChange {
    /// The path whose content should be (re)indexed, or removed for deletions
    pub fn path(&self) -> &Path {
        match self {
            Self::Added(path) | Self::Modified(path) | Self::Deleted(path) => path,
            Self::Renamed { to, .. } => to,
        }
    }

    /// Ordering hint within a batch (lower first): deletions before writes
    pub fn priority(&self) -> u8 {
        match self {
            Self::Deleted(_) => 0,
            Self::Renamed { .. } => 1,
            Self::Modified(_) => 2,
            Self::Added(_) => 3,
        }
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::Deleted(_))
    }

    /// Paths that no longer hold the indexed content after this change
    pub fn removed_paths(&self) -> Vec<&Path> {
        match self {
            Self::Deleted(path) => vec![path.as_path()],
            Self::Renamed { from, .. } => vec![from.as_path()],
            Self::Added(_) | Self::Modified(_) => Vec::new(),
        }
    }

    /// Paths whose current content must be read and indexed
    pub fn written_paths(&self) -> Vec<&Path> {
        match self {
            Self::Added(path) | Self::Modified(path) => vec![path.as_path()],
            Self::Renamed { to, .. } => vec![to.as_path()],
            Self::Deleted(_) => Vec::new(),
        }
    }
}

/// Event with debounce metadata
#[derive(Debug, Clone)]
pub struct DebouncedEvent {
    pub event: FileChange,
    pub last_updated: Instant,
    /// Number of raw events folded into this one
    pub occurrence_count: u32,
}

impl DebouncedEvent {
    pub fn new(event: FileChange) -> Self {
        Self {
            event,
            last_updated: Instant::now(),
            occurrence_count: 1,
        }
    }

    /// Fold a later event for the same path into this one
    ///
    /// An add followed by writes stays an add; a delete followed by an add is
    /// a modification (editors that save by replacing the file do this).
    /// Anything else takes the later event.
    pub fn update(&mut self, event: FileChange) {
        let merged = match (&self.event, event) {
            (FileChange::Added(path), FileChange::Modified(_)) => FileChange::Added(path.clone()),
            (FileChange::Deleted(_), FileChange::Added(path)) => FileChange::Modified(path),
            (_, later) => later,
        };
        self.event = merged;
        self.last_updated = Instant::now();
        self.occurrence_count += 1;
    }

    pub fn time_since_update(&self) -> Duration {
        self.last_updated.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_change_priority() {
        let delete = FileChange::Deleted(PathBuf::from("a.rs"));
        let modify = FileChange::Modified(PathBuf::from("a.rs"));
        let create = FileChange::Added(PathBuf::from("a.rs"));

        assert!(delete.priority() < modify.priority());
        assert!(modify.priority() < create.priority());
    }

    #[test]
    fn test_rename_splits_into_removed_and_written_paths() {
        let rename = FileChange::Renamed {
            from: PathBuf::from("old.py"),
            to: PathBuf::from("new.py"),
        };
        assert_eq!(rename.path(), Path::new("new.py"));
        assert_eq!(rename.removed_paths(), vec![Path::new("old.py")]);
        assert_eq!(rename.written_paths(), vec![Path::new("new.py")]);
    }

    #[test]
    fn test_added_then_modified_stays_added() {
        let mut debounced = DebouncedEvent::new(FileChange::Added(PathBuf::from("a.rs")));
        debounced.update(FileChange::Modified(PathBuf::from("a.rs")));
        debounced.update(FileChange::Modified(PathBuf::from("a.rs")));

        assert_eq!(debounced.event, FileChange::Added(PathBuf::from("a.rs")));
        assert_eq!(debounced.occurrence_count, 3);
    }

    #[test]
    fn test_deleted_then_added_becomes_modified() {
        let mut debounced = DebouncedEvent::new(FileChange::Deleted(PathBuf::from("a.rs")));
        debounced.update(FileChange::Added(PathBuf::from("a.rs")));
        assert_eq!(debounced.event, FileChange::Modified(PathBuf::from("a.rs")));
    }

    #[test]
    fn test_modified_then_deleted_is_deleted() {
        let mut debounced = DebouncedEvent::new(FileChange::Modified(PathBuf::from("a.rs")));
        debounced.update(FileChange::Deleted(PathBuf::from("a.rs")));
        assert!(debounced.event.is_deletion());
        assert_eq!(debounced.occurrence_count, 2);
    }
}
