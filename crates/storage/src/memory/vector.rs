use super::FailureInjector;
use crate::error::StorageError;
use crate::{VectorHit, VectorStore};
use async_trait::async_trait;
use codegraph_core::entities::{EmbeddingRecord, NodeId};
use codegraph_core::error::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

const STORE: &str = "in-memory vector store";

/// Brute-force cosine similarity over vectors held in memory
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    records: RwLock<HashMap<NodeId, EmbeddingRecord>>,
    dimension: Option<usize>,
    failures: FailureInjector,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects vectors of any other length
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Make every call fail with a connection error until re-enabled
    pub fn set_available(&self, available: bool) {
        self.failures.set_available(available);
    }

    /// Fail the next `count` upserts or deletes with a connection error
    pub fn fail_next_writes(&self, count: usize) {
        self.failures.fail_next_writes(count);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn contains(&self, id: &NodeId) -> bool {
        self.records.read().await.contains_key(id)
    }

    fn check_dimension(&self, actual: usize) -> std::result::Result<(), StorageError> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(StorageError::InvalidDimensions { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        self.failures.check_write(STORE)?;
        for record in &records {
            self.check_dimension(record.vector.len())?;
        }
        let mut stored = self.records.write().await;
        for record in records {
            stored.insert(record.node_id.clone(), record);
        }
        Ok(())
    }

    async fn delete(&self, ids: &[NodeId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.failures.check_write(STORE)?;
        let mut stored = self.records.write().await;
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        self.failures.check_read(STORE)?;
        self.check_dimension(vector.len())?;
        let stored = self.records.read().await;
        let mut hits: Vec<VectorHit> = stored
            .values()
            .map(|record| VectorHit {
                node_id: record.node_id.clone(),
                score: cosine_similarity(vector, &record.vector),
                payload: record.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn text_hashes(&self, ids: &[NodeId]) -> Result<HashMap<NodeId, String>> {
        self.failures.check_read(STORE)?;
        let stored = self.records.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                stored
                    .get(id)
                    .map(|r| (id.clone(), r.payload.text_hash.clone()))
            })
            .collect())
    }
}
