//! Keeping the vector store in step with the graph
//!
//! Every changed symbol gets a vector computed from a short text: a header
//! line (kind, qualified name, signature), the docstring, and the first
//! lines of the body. Vectors are keyed by node identity and carry a hash
//! of their text, so unchanged symbols are never re-embedded.
//!
//! Vector deletions that fail, and the possibly stale vectors of symbols
//! that failed to embed, are queued and retried by [`EmbeddingSync::flush_deletes`].

use crate::common::{retry_with_backoff, RetryPolicy};
use codegraph_core::config::EmbeddingsConfig;
use codegraph_core::entities::{EmbeddingPayload, EmbeddingRecord, NodeId, SymbolNode};
use codegraph_core::error::Result;
use codegraph_embeddings::EmbeddingManager;
use codegraph_storage::VectorStore;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use twox_hash::XxHash3_64;

/// A symbol that did not get a vector this round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddingFailure {
    pub node_id: NodeId,
    pub qualified_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct EmbeddingOutcome {
    pub embedded: usize,
    /// Text unchanged since the stored vector was computed
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<EmbeddingFailure>,
}

impl EmbeddingOutcome {
    fn fail(&mut self, node: &SymbolNode, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(EmbeddingFailure {
            node_id: node.id.clone(),
            qualified_name: node.qualified_name.clone(),
            reason: reason.into(),
        });
    }

    fn absorb(&mut self, other: EmbeddingOutcome) {
        self.embedded += other.embedded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.failures.extend(other.failures);
    }
}

/// Text to embed for `node`, fitted into `max_chars`
///
/// The snippet is cut first, then the docstring, then the header.
pub fn embedding_text(
    node: &SymbolNode,
    content: &str,
    snippet_max_lines: usize,
    max_chars: usize,
) -> String {
    let mut header = format!("{} {}", node.kind, node.qualified_name);
    if let Some(signature) = &node.signature {
        header.push_str(": ");
        header.push_str(signature);
    }
    let mut docstring = node.docstring.clone().unwrap_or_default();
    let mut snippet = snippet(content, node, snippet_max_lines);

    let total = |h: &str, d: &str, s: &str| {
        h.chars().count()
            + d.chars().count()
            + s.chars().count()
            + usize::from(!d.is_empty())
            + usize::from(!s.is_empty())
    };

    let mut excess = total(&header, &docstring, &snippet).saturating_sub(max_chars);
    for part in [&mut snippet, &mut docstring] {
        if excess == 0 {
            break;
        }
        let len = part.chars().count();
        // Dropping a part entirely also drops its separator
        let removable = len + usize::from(len > 0);
        if excess >= removable {
            part.clear();
            excess -= removable;
        } else {
            *part = part.chars().take(len - excess).collect();
            excess = 0;
        }
    }
    if excess > 0 {
        let keep = header.chars().count().saturating_sub(excess);
        header = header.chars().take(keep).collect();
    }

    let mut text = header;
    for part in [docstring, snippet] {
        if !part.is_empty() {
            text.push('\n');
            text.push_str(&part);
        }
    }
    text
}

/// Up to `max_lines` source lines of the node's span
fn snippet(content: &str, node: &SymbolNode, max_lines: usize) -> String {
    let start = node.span.start_line.saturating_sub(1);
    let count = node.span.line_count().min(max_lines);
    content
        .lines()
        .skip(start)
        .take(count)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stored alongside each vector; mixes in the model so a model change
/// invalidates every hash
pub fn text_hash(model_version: &str, text: &str) -> String {
    let mut bytes = Vec::with_capacity(model_version.len() + 1 + text.len());
    bytes.extend_from_slice(model_version.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(text.as_bytes());
    format!("{:016x}", XxHash3_64::oneshot(&bytes))
}

struct Pending {
    node: SymbolNode,
    text: String,
    hash: String,
}

pub struct EmbeddingSync {
    manager: Arc<EmbeddingManager>,
    store: Arc<dyn VectorStore>,
    config: EmbeddingsConfig,
    retry: RetryPolicy,
    pending_deletes: Mutex<BTreeSet<NodeId>>,
}

impl EmbeddingSync {
    pub fn new(
        manager: Arc<EmbeddingManager>,
        store: Arc<dyn VectorStore>,
        config: EmbeddingsConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            manager,
            store,
            config,
            retry,
            pending_deletes: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn manager(&self) -> &Arc<EmbeddingManager> {
        &self.manager
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    fn max_input_chars(&self) -> usize {
        self.config
            .max_input_chars
            .min(self.manager.provider().max_input_chars())
    }

    /// Embed `nodes`, all declared in a file with the given `content`
    ///
    /// Never fails: a node that cannot be embedded is reported in the
    /// outcome and left for the next reconciliation.
    pub async fn sync(&self, content: &str, nodes: &[SymbolNode]) -> EmbeddingOutcome {
        let mut outcome = EmbeddingOutcome::default();
        if nodes.is_empty() {
            return outcome;
        }

        let ids: Vec<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
        {
            let mut queued = self.pending_deletes.lock().await;
            for id in &ids {
                queued.remove(id);
            }
        }
        let stored_hashes = match self.store.text_hashes(&ids).await {
            Ok(hashes) => hashes,
            Err(e) => {
                debug!(error = %e, "Could not read stored text hashes, embedding everything");
                HashMap::new()
            }
        };

        let max_chars = self.max_input_chars();
        let model_version = self.manager.model_version();
        let mut pending = Vec::new();
        for node in nodes {
            let text = embedding_text(node, content, self.config.snippet_max_lines, max_chars);
            let hash = text_hash(model_version, &text);
            if stored_hashes.get(&node.id) == Some(&hash) {
                outcome.skipped += 1;
                continue;
            }
            pending.push(Pending {
                node: node.clone(),
                text,
                hash,
            });
        }

        let chunk_size = self.config.texts_per_api_request.max(1);
        let chunks: Vec<Vec<Pending>> = {
            let mut chunks = Vec::new();
            let mut iter = pending.into_iter().peekable();
            while iter.peek().is_some() {
                chunks.push(iter.by_ref().take(chunk_size).collect());
            }
            chunks
        };

        let results: Vec<EmbeddingOutcome> = stream::iter(chunks)
            .map(|chunk| self.embed_chunk(chunk))
            .buffer_unordered(self.config.max_concurrent_api_requests.max(1))
            .collect()
            .await;
        for result in results {
            outcome.absorb(result);
        }

        if outcome.failed > 0 {
            warn!(
                failed = outcome.failed,
                embedded = outcome.embedded,
                "Some symbols could not be embedded"
            );
            // A symbol that failed keeps no older vector
            self.pending_deletes
                .lock()
                .await
                .extend(outcome.failures.iter().map(|f| f.node_id.clone()));
        }
        outcome
    }

    /// Which of `ids` have no vector stored
    pub async fn missing(&self, ids: &[NodeId]) -> Result<Vec<NodeId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let stored = self.store.text_hashes(ids).await?;
        Ok(ids
            .iter()
            .filter(|id| !stored.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn embed_chunk(&self, chunk: Vec<Pending>) -> EmbeddingOutcome {
        let mut outcome = EmbeddingOutcome::default();
        let texts: Vec<String> = chunk.iter().map(|p| p.text.clone()).collect();

        let vectors = match self.manager.embed(texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                for item in &chunk {
                    outcome.fail(&item.node, e.to_string());
                }
                return outcome;
            }
        };

        let dimension = self.manager.provider().embedding_dimension();
        let mut records = Vec::with_capacity(chunk.len());
        let mut embedded_nodes = Vec::with_capacity(chunk.len());
        for (item, vector) in chunk.into_iter().zip(vectors.into_iter().chain(std::iter::repeat(None))) {
            match vector {
                Some(vector) if vector.len() == dimension => {
                    records.push(EmbeddingRecord {
                        node_id: item.node.id.clone(),
                        payload: EmbeddingPayload::for_node(&item.node, item.hash),
                        vector,
                    });
                    embedded_nodes.push(item.node);
                }
                Some(vector) => outcome.fail(
                    &item.node,
                    format!(
                        "vector has {} dimensions, expected {dimension}",
                        vector.len()
                    ),
                ),
                None => outcome.fail(&item.node, "endpoint returned no vector"),
            }
        }
        if records.is_empty() {
            return outcome;
        }

        let written = retry_with_backoff(self.retry, "Vector upsert", || {
            self.store.upsert(records.clone())
        })
        .await;
        match written {
            Ok(()) => outcome.embedded += records.len(),
            Err(e) => {
                for node in &embedded_nodes {
                    outcome.fail(node, e.to_string());
                }
            }
        }
        outcome
    }

    /// Drop the vectors of retracted symbols
    ///
    /// Deletions still queued from earlier failures go along. On failure
    /// every identity stays queued.
    pub async fn remove(&self, ids: &[NodeId]) -> Result<()> {
        let batch: Vec<NodeId> = {
            let mut queued = self.pending_deletes.lock().await;
            queued.extend(ids.iter().cloned());
            queued.iter().cloned().collect()
        };
        if batch.is_empty() {
            return Ok(());
        }
        retry_with_backoff(self.retry, "Vector delete", || self.store.delete(&batch)).await?;

        let mut queued = self.pending_deletes.lock().await;
        for id in &batch {
            queued.remove(id);
        }
        Ok(())
    }

    /// Retry the queued deletions; returns how many were sent
    pub async fn flush_deletes(&self) -> Result<usize> {
        let queued = self.pending_deletes.lock().await.len();
        if queued > 0 {
            self.remove(&[]).await?;
        }
        Ok(queued)
    }

    /// Identities whose vectors are waiting to be deleted
    pub async fn queued_deletes(&self) -> usize {
        self.pending_deletes.lock().await.len()
    }
}
