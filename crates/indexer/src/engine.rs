//! Reconciliation engine
//!
//! Brings the graph and vector stores up to date with a change set. Each
//! file in scope goes through
//!
//! ```text
//! read -> fingerprint unchanged? -> embed symbols without vectors -> done
//!      -> extract -> merge (atomic) -> embed -> done
//! missing -> retract owned state -> done
//! ```
//!
//! Files are processed concurrently up to `indexer.max_concurrency`. A file
//! that fails is reported and left with its old fingerprint, so the next
//! pass picks it up again.

use crate::common::{is_binary, retry_with_backoff, RetryPolicy};
use crate::embedding_sync::{EmbeddingOutcome, EmbeddingSync};
use crate::graph_sync::{GraphSync, MergeOutcome};
use crate::report::{FileFailure, ReconciliationReport};
use crate::source::{source_for, ChangeSet, FileContent, FileTask, SourceProvider};
use codegraph_core::config::{IndexerConfig, WatcherConfig};
use codegraph_core::entities::{FileIndexEntry, NodeId};
use codegraph_core::entity_id::content_fingerprint;
use codegraph_core::error::{Error, Result};
use codegraph_languages::ParserManager;
use codegraph_watcher::{FileChange, FileWatcher};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

enum FileOutcome {
    Unchanged(EmbeddingOutcome),
    Indexed {
        merge: MergeOutcome,
        embeddings: EmbeddingOutcome,
        degraded: bool,
        warnings: Vec<FileFailure>,
    },
    Deleted {
        merge: MergeOutcome,
        warnings: Vec<FileFailure>,
    },
    /// A deletion for a file that was never indexed
    Untracked,
    Skipped,
    Failed(Error),
}

pub struct ReconciliationEngine {
    parser: Arc<ParserManager>,
    graph_sync: Arc<GraphSync>,
    embedding_sync: Arc<EmbeddingSync>,
    config: IndexerConfig,
    retry: RetryPolicy,
}

impl ReconciliationEngine {
    pub fn new(
        parser: Arc<ParserManager>,
        graph_sync: Arc<GraphSync>,
        embedding_sync: Arc<EmbeddingSync>,
        config: IndexerConfig,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            parser,
            graph_sync,
            embedding_sync,
            config,
            retry,
        }
    }

    pub fn graph_sync(&self) -> &Arc<GraphSync> {
        &self.graph_sync
    }

    pub fn embedding_sync(&self) -> &Arc<EmbeddingSync> {
        &self.embedding_sync
    }

    /// Full reconciliation of everything under `root`
    pub async fn index(&self, root: &Path) -> Result<ReconciliationReport> {
        self.reconcile(root, ChangeSet::Full).await
    }

    /// Reconcile the files named by `change_set`
    ///
    /// Returns a report even when files fail. The only error is a pass in
    /// which files were attempted and every one of them failed because a
    /// store was unavailable, or a full walk whose file index could not be
    /// read at all.
    pub async fn reconcile(&self, root: &Path, change_set: ChangeSet) -> Result<ReconciliationReport> {
        let start = Instant::now();
        let full = matches!(change_set, ChangeSet::Full);
        let source = source_for(
            root,
            change_set,
            self.config.max_file_size,
            self.config.respect_gitignore,
        )?;

        let known: Vec<FileIndexEntry> = if full {
            let store = self.graph_sync.store();
            retry_with_backoff(self.retry, "File index read", || store.file_entries()).await?
        } else {
            Vec::new()
        };

        let plan = source.plan(&known).await?;
        info!(
            root = %root.display(),
            files = plan.tasks.len(),
            rejected = plan.rejected.len(),
            "Starting reconciliation"
        );

        let mut report = ReconciliationReport::default();
        for rejected in plan.rejected {
            report.record_failure(rejected);
        }

        match self.embedding_sync.flush_deletes().await {
            Ok(0) => {}
            Ok(count) => debug!(count, "Deleted vectors queued by earlier passes"),
            Err(e) => warn!(error = %e, "Queued vector deletions failed again"),
        }

        let source_ref = source.as_ref();
        let results: Vec<(String, FileOutcome)> = stream::iter(plan.tasks)
            .map(|task| async move {
                let path = task.path().to_string();
                (path, self.process(task, source_ref).await)
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut attempted = 0usize;
        let mut store_failures = 0usize;
        for (path, outcome) in results {
            report.files_scanned += 1;
            match outcome {
                FileOutcome::Unchanged(embeddings) => {
                    attempted += 1;
                    report.files_unchanged += 1;
                    report.record_embeddings(embeddings);
                }
                FileOutcome::Indexed {
                    merge,
                    embeddings,
                    degraded,
                    warnings,
                } => {
                    attempted += 1;
                    report.files_indexed += 1;
                    if degraded {
                        report.files_degraded += 1;
                    }
                    report.record_merge(&merge);
                    report.record_embeddings(embeddings);
                    report.warnings.extend(warnings);
                }
                FileOutcome::Deleted { merge, warnings } => {
                    attempted += 1;
                    report.files_deleted += 1;
                    report.record_merge(&merge);
                    report.warnings.extend(warnings);
                }
                FileOutcome::Untracked => {}
                FileOutcome::Skipped => report.files_skipped += 1,
                FileOutcome::Failed(e) => {
                    attempted += 1;
                    if e.kind_label() == "store_unavailable" {
                        store_failures += 1;
                    }
                    warn!(file_path = %path, error = %e, "File failed to reconcile");
                    report.record_failure(FileFailure::new(path, &e));
                }
            }
        }
        report.failures.sort_by(|a, b| a.path.cmp(&b.path));
        report.duration_ms = start.elapsed().as_millis() as u64;

        if attempted > 0 && store_failures == attempted {
            error!(files = attempted, "Every file failed: store unavailable");
            return Err(Error::store_unavailable(format!(
                "all {attempted} files failed because a store is unavailable"
            )));
        }

        info!(
            scanned = report.files_scanned,
            indexed = report.files_indexed,
            unchanged = report.files_unchanged,
            deleted = report.files_deleted,
            failed = report.files_failed,
            duration_ms = report.duration_ms,
            "Reconciliation complete"
        );
        Ok(report)
    }

    async fn process(&self, task: FileTask, source: &dyn SourceProvider) -> FileOutcome {
        let result = match task {
            FileTask::Upsert(path) => self.upsert_file(&path, source).await,
            FileTask::Delete(path) => self.delete_file(&path).await,
        };
        result.unwrap_or_else(FileOutcome::Failed)
    }

    async fn upsert_file(&self, path: &str, source: &dyn SourceProvider) -> Result<FileOutcome> {
        let language = ParserManager::detect_language(path);
        if !self.parser.supports(language) {
            debug!(file_path = %path, language = %language, "Skipping unsupported file");
            return Ok(FileOutcome::Skipped);
        }

        let content = retry_with_backoff(self.retry, "File read", || source.read(path)).await?;
        let bytes = match content {
            FileContent::Content(bytes) if !is_binary(&bytes) => bytes,
            FileContent::Content(_) => {
                debug!(file_path = %path, "Skipping binary file");
                return self.retract_excluded(path).await;
            }
            FileContent::Excluded(reason) => {
                debug!(file_path = %path, ?reason, "Skipping excluded file");
                return self.retract_excluded(path).await;
            }
            FileContent::Missing => return self.delete_file(path).await,
        };

        let store = self.graph_sync.store();
        let previous =
            retry_with_backoff(self.retry, "File index read", || store.file_entry(path)).await?;
        let fingerprint = content_fingerprint(&bytes);
        if let Some(entry) = previous
            .as_ref()
            .filter(|entry| entry.fingerprint == fingerprint)
        {
            let embeddings = self.embed_missing(entry, &bytes).await;
            return Ok(FileOutcome::Unchanged(embeddings));
        }

        let text = String::from_utf8_lossy(&bytes).into_owned();
        let parser = Arc::clone(&self.parser);
        let file = path.to_string();
        let extraction_text = text.clone();
        let record = tokio::task::spawn_blocking(move || {
            parser.extract(&file, &extraction_text, Some(language))
        })
        .await
        .map_err(|e| Error::Other(anyhow::anyhow!("extraction task panicked: {e}")))??;

        let mut warnings = Vec::new();
        if let Some(failure) = &record.failure {
            let error = Error::parse(path, &failure.message);
            if record.nodes.is_empty() {
                return Err(error);
            }
            warnings.push(FileFailure::new(path, &error));
        }

        let merge = retry_with_backoff(self.retry, "Graph merge", || {
            self.graph_sync
                .merge(&record, &fingerprint, previous.as_ref())
        })
        .await?;

        // The merge is committed; embedding problems no longer fail the file
        let embeddings = self.embedding_sync.sync(&text, &merge.changed_nodes).await;
        if let Some(warning) = self.remove_vectors(path, &merge.retracted_nodes).await {
            warnings.push(warning);
        }

        Ok(FileOutcome::Indexed {
            merge,
            embeddings,
            degraded: record.degraded,
            warnings,
        })
    }

    /// Embed the symbols of an unchanged file that have no vector yet
    ///
    /// A store that cannot be read leaves them for the next pass.
    async fn embed_missing(&self, entry: &FileIndexEntry, bytes: &[u8]) -> EmbeddingOutcome {
        let path = entry.path.as_str();
        let ids: Vec<NodeId> = entry.node_ids.iter().cloned().collect();
        let missing = match self.embedding_sync.missing(&ids).await {
            Ok(missing) if missing.is_empty() => return EmbeddingOutcome::default(),
            Ok(missing) => missing,
            Err(e) => {
                debug!(file_path = %path, error = %e, "Could not check vectors of unchanged file");
                return EmbeddingOutcome::default();
            }
        };
        let nodes = match self.graph_sync.store().get_nodes(&missing).await {
            Ok(nodes) => nodes,
            Err(e) => {
                debug!(file_path = %path, error = %e, "Could not load symbols missing vectors");
                return EmbeddingOutcome::default();
            }
        };

        debug!(file_path = %path, symbols = nodes.len(), "Embedding symbols without vectors");
        let text = String::from_utf8_lossy(bytes);
        self.embedding_sync.sync(&text, &nodes).await
    }

    async fn delete_file(&self, path: &str) -> Result<FileOutcome> {
        let store = self.graph_sync.store();
        let Some(entry) =
            retry_with_backoff(self.retry, "File index read", || store.file_entry(path)).await?
        else {
            return Ok(FileOutcome::Untracked);
        };

        let merge = retry_with_backoff(self.retry, "File removal", || {
            self.graph_sync.remove_file(&entry)
        })
        .await?;
        let warnings = self
            .remove_vectors(path, &merge.retracted_nodes)
            .await
            .into_iter()
            .collect();
        Ok(FileOutcome::Deleted { merge, warnings })
    }

    /// A file that may no longer be indexed loses whatever it owned
    async fn retract_excluded(&self, path: &str) -> Result<FileOutcome> {
        match self.delete_file(path).await? {
            FileOutcome::Untracked => Ok(FileOutcome::Skipped),
            outcome => Ok(outcome),
        }
    }

    async fn remove_vectors(&self, path: &str, ids: &[NodeId]) -> Option<FileFailure> {
        match self.embedding_sync.remove(ids).await {
            Ok(()) => None,
            Err(e) => {
                warn!(file_path = %path, error = %e, "Failed to delete vectors of retracted symbols, queued for the next pass");
                Some(FileFailure::new(path, &e))
            }
        }
    }

    /// Reconcile each batch of changes arriving on `batches`
    ///
    /// One report (or hard error) is sent per non-empty batch. The task
    /// ends when `batches` closes or the receiver is dropped.
    pub fn reconcile_stream(
        self: Arc<Self>,
        root: PathBuf,
        mut batches: mpsc::Receiver<Vec<FileChange>>,
    ) -> mpsc::Receiver<Result<ReconciliationReport>> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            while let Some(batch) = batches.recv().await {
                if batch.is_empty() {
                    continue;
                }
                debug!(changes = batch.len(), "Reconciling watch batch");
                let result = self.reconcile(&root, ChangeSet::Explicit(batch)).await;
                if tx.send(result).await.is_err() {
                    break;
                }
            }
            debug!("Watch reconciliation stopped");
        });
        rx
    }

    /// Watch `root` and keep the stores reconciled with it
    ///
    /// The returned watcher must be kept alive for events to flow.
    pub async fn watch(
        self: Arc<Self>,
        root: PathBuf,
        config: WatcherConfig,
    ) -> Result<(FileWatcher, mpsc::Receiver<Result<ReconciliationReport>>)> {
        let mut watcher = FileWatcher::new(config)?;
        let batches = watcher.watch_batches(&root).await?;
        Ok((watcher, self.reconcile_stream(root, batches)))
    }
}
