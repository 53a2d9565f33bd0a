//! Reconciliation reports

use crate::embedding_sync::{EmbeddingFailure, EmbeddingOutcome};
use crate::graph_sync::MergeOutcome;
use codegraph_core::error::Error;
use serde::Serialize;

/// A file that could not be brought up to date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    /// Error kind label, e.g. `store_unavailable` or `parse_failure`
    pub kind: String,
    pub message: String,
}

impl FileFailure {
    pub fn new(path: impl Into<String>, error: &Error) -> Self {
        Self {
            path: path.into(),
            kind: error.kind_label().to_string(),
            message: error.to_string(),
        }
    }
}

/// What one reconciliation pass did, file by file and in total
///
/// Partial failure is normal: failed files are listed in `failures` and
/// will be retried by the next pass because their fingerprint was not
/// updated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub files_scanned: usize,
    pub files_unchanged: usize,
    pub files_indexed: usize,
    pub files_deleted: usize,
    pub files_failed: usize,
    /// Binary, oversized, symlinked or unsupported files
    pub files_skipped: usize,
    pub files_degraded: usize,

    pub nodes_added: usize,
    pub nodes_updated: usize,
    pub nodes_retracted: usize,
    pub edges_added: usize,
    pub edges_updated: usize,
    pub edges_retracted: usize,
    pub edges_relinked: usize,
    pub edges_reverted: usize,
    pub ambiguous_resolutions: usize,
    pub identity_conflicts: usize,

    pub embeddings_embedded: usize,
    pub embeddings_skipped: usize,
    pub embeddings_failed: usize,

    pub failures: Vec<FileFailure>,
    /// Files indexed from a partial parse
    pub warnings: Vec<FileFailure>,
    pub embedding_failures: Vec<EmbeddingFailure>,

    pub duration_ms: u64,
}

impl ReconciliationReport {
    pub(crate) fn record_merge(&mut self, outcome: &MergeOutcome) {
        self.nodes_added += outcome.nodes_added;
        self.nodes_updated += outcome.nodes_updated;
        self.nodes_retracted += outcome.nodes_retracted;
        self.edges_added += outcome.edges_added;
        self.edges_updated += outcome.edges_updated;
        self.edges_retracted += outcome.edges_retracted;
        self.edges_relinked += outcome.edges_relinked;
        self.edges_reverted += outcome.edges_reverted;
        self.ambiguous_resolutions += outcome.ambiguous_resolutions;
        self.identity_conflicts += outcome.identity_conflicts;
    }

    pub(crate) fn record_embeddings(&mut self, outcome: EmbeddingOutcome) {
        self.embeddings_embedded += outcome.embedded;
        self.embeddings_skipped += outcome.skipped;
        self.embeddings_failed += outcome.failed;
        self.embedding_failures.extend(outcome.failures);
    }

    pub(crate) fn record_failure(&mut self, failure: FileFailure) {
        self.files_failed += 1;
        self.failures.push(failure);
    }

    /// Fold another report (for example the next watch batch) into this one
    pub fn merge(&mut self, other: ReconciliationReport) {
        self.files_scanned += other.files_scanned;
        self.files_unchanged += other.files_unchanged;
        self.files_indexed += other.files_indexed;
        self.files_deleted += other.files_deleted;
        self.files_failed += other.files_failed;
        self.files_skipped += other.files_skipped;
        self.files_degraded += other.files_degraded;
        self.nodes_added += other.nodes_added;
        self.nodes_updated += other.nodes_updated;
        self.nodes_retracted += other.nodes_retracted;
        self.edges_added += other.edges_added;
        self.edges_updated += other.edges_updated;
        self.edges_retracted += other.edges_retracted;
        self.edges_relinked += other.edges_relinked;
        self.edges_reverted += other.edges_reverted;
        self.ambiguous_resolutions += other.ambiguous_resolutions;
        self.identity_conflicts += other.identity_conflicts;
        self.embeddings_embedded += other.embeddings_embedded;
        self.embeddings_skipped += other.embeddings_skipped;
        self.embeddings_failed += other.embeddings_failed;
        self.failures.extend(other.failures);
        self.warnings.extend(other.warnings);
        self.embedding_failures.extend(other.embedding_failures);
        self.duration_ms += other.duration_ms;
    }

    /// Node and edge deltas are all zero
    pub fn is_noop(&self) -> bool {
        self.nodes_added == 0
            && self.nodes_updated == 0
            && self.nodes_retracted == 0
            && self.edges_added == 0
            && self.edges_updated == 0
            && self.edges_retracted == 0
            && self.edges_relinked == 0
            && self.edges_reverted == 0
    }

    /// Paths of the failed files
    pub fn failed_paths(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.path.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_adds_counts_and_lists() {
        let mut first = ReconciliationReport {
            files_indexed: 2,
            nodes_added: 5,
            ..Default::default()
        };
        first.record_failure(FileFailure::new("a.py", &Error::store_unavailable("down")));

        let mut second = ReconciliationReport {
            files_indexed: 1,
            files_deleted: 1,
            nodes_retracted: 3,
            ..Default::default()
        };
        second.record_failure(FileFailure::new("b.py", &Error::parse("b.py", "bad")));

        first.merge(second);
        assert_eq!(first.files_indexed, 3);
        assert_eq!(first.files_failed, 2);
        assert_eq!(first.nodes_added, 5);
        assert_eq!(first.nodes_retracted, 3);
        assert_eq!(first.failed_paths(), vec!["a.py", "b.py"]);
        assert_eq!(first.failures[0].kind, "store_unavailable");
        assert_eq!(first.failures[1].kind, "parse_failure");
        assert!(!first.is_noop());
    }

    #[test]
    fn test_report_serializes() {
        let report = ReconciliationReport::default();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files_indexed"], 0);
        assert!(report.is_noop());
    }
}
