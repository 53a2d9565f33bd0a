//! Graph and vector store interfaces with their backends
//!
//! The core reaches durable state only through [`GraphStore`] and
//! [`VectorStore`]. Each has an in-memory backend (used by tests and
//! single-process runs) and a remote one: Neo4j for the graph, Qdrant for
//! vectors. The two stores are independent failure domains.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod error;
mod factory;
mod memory;
mod neo4j;
mod qdrant;

pub use error::StorageError;
pub use factory::{create_graph_store, create_vector_store};
pub use memory::{InMemoryGraphStore, InMemoryVectorStore};
pub use neo4j::Neo4jGraphStore;
pub use qdrant::QdrantVectorStore;

use async_trait::async_trait;
use codegraph_core::entities::{
    Direction, Edge, EdgeId, EdgeKind, EmbeddingPayload, EmbeddingRecord, FileIndexEntry, NodeId,
    SymbolNode,
};
use codegraph_core::error::Result;
use std::collections::{HashMap, HashSet};

/// One atomic unit of graph writes
///
/// Deletions are applied first, then upserts, then the file entry changes.
/// Deleting a node or edge also drops its identity from the owning file's
/// entry and upserting an edge adds it there; a `put_file_entry` in the
/// same batch replaces the entry outright.
#[derive(Debug, Clone, Default)]
pub struct GraphBatch {
    pub upsert_nodes: Vec<SymbolNode>,
    pub upsert_edges: Vec<Edge>,
    pub delete_nodes: Vec<NodeId>,
    pub delete_edges: Vec<EdgeId>,
    pub put_file_entry: Option<FileIndexEntry>,
    pub remove_file_entry: Option<String>,
}

impl GraphBatch {
    pub fn is_empty(&self) -> bool {
        self.upsert_nodes.is_empty()
            && self.upsert_edges.is_empty()
            && self.delete_nodes.is_empty()
            && self.delete_edges.is_empty()
            && self.put_file_entry.is_none()
            && self.remove_file_entry.is_none()
    }
}

/// Selector for [`GraphStore::edges_targeting`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTargetQuery {
    /// Edges resolved to this node
    ById(NodeId),
    /// Edges whose recorded target name is this, resolved or not
    ByName(String),
}

/// One nearest-neighbour result
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub node_id: NodeId,
    pub score: f32,
    pub payload: EmbeddingPayload,
}

/// Durable symbol graph
///
/// Every method is safe to call concurrently. `apply_batch` is atomic:
/// either all of its writes become visible or none do.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Apply a batch of writes atomically
    async fn apply_batch(&self, batch: GraphBatch) -> Result<()>;

    /// Insert or replace one node by identity
    async fn upsert_node(&self, node: SymbolNode) -> Result<()> {
        self.apply_batch(GraphBatch {
            upsert_nodes: vec![node],
            ..GraphBatch::default()
        })
        .await
    }

    /// Insert or replace one edge by identity
    async fn upsert_edge(&self, edge: Edge) -> Result<()> {
        self.apply_batch(GraphBatch {
            upsert_edges: vec![edge],
            ..GraphBatch::default()
        })
        .await
    }

    /// Delete nodes. Edges pointing at them are left alone.
    async fn delete_nodes(&self, ids: &[NodeId]) -> Result<()> {
        self.apply_batch(GraphBatch {
            delete_nodes: ids.to_vec(),
            ..GraphBatch::default()
        })
        .await
    }

    async fn delete_edges(&self, ids: &[EdgeId]) -> Result<()> {
        self.apply_batch(GraphBatch {
            delete_edges: ids.to_vec(),
            ..GraphBatch::default()
        })
        .await
    }

    /// Nodes whose simple name, qualified name or qualified-name suffix
    /// matches `name` (see [`name_matches`])
    async fn find_by_name(&self, name: &str) -> Result<Vec<SymbolNode>>;

    /// Nodes for the given identities; missing identities are skipped
    async fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<SymbolNode>>;

    /// Edges for the given identities; missing identities are skipped
    async fn get_edges(&self, ids: &[EdgeId]) -> Result<Vec<Edge>>;

    /// Edges leaving any of `sources`, optionally of one kind
    async fn edges_from(&self, sources: &[NodeId], kind: Option<EdgeKind>) -> Result<Vec<Edge>>;

    async fn edges_targeting(&self, target: &EdgeTargetQuery) -> Result<Vec<Edge>>;

    /// Unresolved edges waiting for a symbol with one of these names
    async fn unresolved_edges_named(&self, names: &[String]) -> Result<Vec<Edge>>;

    async fn file_entry(&self, path: &str) -> Result<Option<FileIndexEntry>>;

    async fn file_entries(&self) -> Result<Vec<FileIndexEntry>>;

    /// Breadth-first walk along resolved edges of `kind`
    ///
    /// Returns one level per depth (index 0 is depth 1). Each node appears
    /// once, at the shallowest depth it is reachable from; the start node
    /// only appears if it is reachable from itself. Levels are ordered by
    /// qualified name and trailing empty levels are dropped.
    async fn traverse(
        &self,
        start: &NodeId,
        kind: EdgeKind,
        direction: Direction,
        max_depth: usize,
    ) -> Result<Vec<Vec<SymbolNode>>> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut frontier = vec![start.clone()];
        let mut levels = Vec::new();

        for _ in 0..max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut next: Vec<NodeId> = Vec::new();
            match direction {
                Direction::Forward => {
                    for edge in self.edges_from(&frontier, Some(kind)).await? {
                        if let Some(target) = edge.target.resolved {
                            next.push(target);
                        }
                    }
                }
                Direction::Reverse => {
                    for id in &frontier {
                        for edge in self
                            .edges_targeting(&EdgeTargetQuery::ById(id.clone()))
                            .await?
                        {
                            if edge.kind == kind {
                                next.push(edge.source);
                            }
                        }
                    }
                }
            }
            next.retain(|id| visited.insert(id.clone()));
            if next.is_empty() {
                break;
            }
            let mut level = self.get_nodes(&next).await?;
            level.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
            levels.push(level);
            frontier = next;
        }

        Ok(levels)
    }
}

/// Durable vector index keyed by node identity
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite the vectors of these nodes
    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> Result<()>;

    async fn delete(&self, ids: &[NodeId]) -> Result<()>;

    /// Nearest neighbours by cosine similarity, best first
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorHit>>;

    /// Stored text hashes for the nodes that have a vector
    async fn text_hashes(&self, ids: &[NodeId]) -> Result<HashMap<NodeId, String>>;
}

/// Final segment of a possibly qualified name
pub fn simple_name(name: &str) -> &str {
    let tail = name.rsplit("::").next().unwrap_or(name);
    tail.rsplit('.').next().unwrap_or(tail)
}

/// Whether `node` answers a lookup for `query`
///
/// A plain name matches the node's simple name. A qualified query matches
/// the full qualified name or any suffix of it that starts at a separator,
/// so `Store::get` finds `storage::Store::get`.
pub fn name_matches(node: &SymbolNode, query: &str) -> bool {
    if node.qualified_name == query {
        return true;
    }
    if simple_name(query) == query {
        return node.name == query;
    }
    node.qualified_name
        .strip_suffix(query)
        .is_some_and(|prefix| prefix.ends_with("::") || prefix.ends_with('.'))
}

/// Whether an edge's recorded target name answers a lookup for `query`
///
/// Names are compared on their final segment; when both sides are
/// qualified they must agree exactly.
pub fn edge_target_matches(edge: &Edge, query: &str) -> bool {
    let target = edge.target.name.as_str();
    if target == query {
        return true;
    }
    simple_name(target) == simple_name(query)
        && (simple_name(query) == query || simple_name(target) == target)
}
