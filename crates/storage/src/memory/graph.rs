use super::FailureInjector;
use crate::{edge_target_matches, name_matches, simple_name, EdgeTargetQuery, GraphBatch, GraphStore};
use async_trait::async_trait;
use codegraph_core::entities::{Edge, EdgeId, EdgeKind, FileIndexEntry, NodeId, SymbolNode};
use codegraph_core::error::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

const STORE: &str = "in-memory graph store";

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<NodeId, SymbolNode>,
    edges: HashMap<EdgeId, Edge>,
    /// Simple name to nodes
    by_name: HashMap<String, BTreeSet<NodeId>>,
    outgoing: HashMap<NodeId, BTreeSet<EdgeId>>,
    /// Resolved target to edges
    incoming: HashMap<NodeId, BTreeSet<EdgeId>>,
    /// Simple target name to edges, resolved or not
    by_target_name: HashMap<String, BTreeSet<EdgeId>>,
    /// Simple target name to unresolved edges
    pending: HashMap<String, BTreeSet<EdgeId>>,
    files: BTreeMap<String, FileIndexEntry>,
}

fn unindex<K, V>(index: &mut HashMap<K, BTreeSet<V>>, key: &K, value: &V)
where
    K: std::hash::Hash + Eq,
    V: Ord,
{
    if let Some(set) = index.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

impl GraphState {
    fn insert_node(&mut self, node: SymbolNode) {
        if let Some(previous) = self.nodes.get(&node.id) {
            let name = previous.name.clone();
            unindex(&mut self.by_name, &name, &node.id);
        }
        self.by_name
            .entry(node.name.clone())
            .or_default()
            .insert(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    fn remove_node(&mut self, id: &NodeId) -> Option<SymbolNode> {
        let node = self.nodes.remove(id)?;
        unindex(&mut self.by_name, &node.name, id);
        if let Some(entry) = self.files.get_mut(&node.file) {
            entry.node_ids.remove(id);
        }
        Some(node)
    }

    fn insert_edge(&mut self, edge: Edge) {
        self.unindex_edge(&edge.id);
        let key = simple_name(&edge.target.name).to_string();
        self.outgoing
            .entry(edge.source.clone())
            .or_default()
            .insert(edge.id.clone());
        self.by_target_name
            .entry(key.clone())
            .or_default()
            .insert(edge.id.clone());
        match &edge.target.resolved {
            Some(target) => {
                self.incoming
                    .entry(target.clone())
                    .or_default()
                    .insert(edge.id.clone());
            }
            None => {
                self.pending.entry(key).or_default().insert(edge.id.clone());
            }
        }
        self.edges.insert(edge.id.clone(), edge);
    }

    fn unindex_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        let key = simple_name(&edge.target.name).to_string();
        unindex(&mut self.outgoing, &edge.source, id);
        unindex(&mut self.by_target_name, &key, id);
        match &edge.target.resolved {
            Some(target) => unindex(&mut self.incoming, target, id),
            None => unindex(&mut self.pending, &key, id),
        }
        Some(edge)
    }

    fn remove_edge(&mut self, id: &EdgeId) {
        if let Some(edge) = self.unindex_edge(id) {
            if let Some(entry) = self.files.get_mut(&edge.file) {
                entry.edge_ids.remove(id);
            }
        }
    }

    fn edges_for<'a>(&'a self, ids: impl IntoIterator<Item = &'a EdgeId>) -> Vec<Edge> {
        ids.into_iter()
            .filter_map(|id| self.edges.get(id).cloned())
            .collect()
    }
}

/// Graph store held entirely in process memory
///
/// Lookups by name, by source, by resolved target and by pending target
/// name are served from indexes kept in step with every write.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    state: RwLock<GraphState>,
    failures: FailureInjector,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a connection error until re-enabled
    pub fn set_available(&self, available: bool) {
        self.failures.set_available(available);
    }

    /// Fail the next `count` write batches with a connection error
    pub fn fail_next_batches(&self, count: usize) {
        self.failures.fail_next_writes(count);
    }

    pub async fn node_count(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.state.read().await.edges.len()
    }

    /// Every stored node, ordered by qualified name
    pub async fn all_nodes(&self) -> Vec<SymbolNode> {
        let state = self.state.read().await;
        let mut nodes: Vec<SymbolNode> = state.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name).then(a.id.cmp(&b.id)));
        nodes
    }

    /// Every stored edge, ordered by identity
    pub async fn all_edges(&self) -> Vec<Edge> {
        let state = self.state.read().await;
        let mut edges: Vec<Edge> = state.edges.values().cloned().collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        edges
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn apply_batch(&self, batch: GraphBatch) -> Result<()> {
        self.failures.check_write(STORE)?;
        if batch.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;
        for id in &batch.delete_edges {
            state.remove_edge(id);
        }
        for id in &batch.delete_nodes {
            state.remove_node(id);
        }
        for node in batch.upsert_nodes {
            state.insert_node(node);
        }
        for edge in batch.upsert_edges {
            if let Some(entry) = state.files.get_mut(&edge.file) {
                entry.edge_ids.insert(edge.id.clone());
            }
            state.insert_edge(edge);
        }
        if let Some(path) = batch.remove_file_entry {
            state.files.remove(&path);
        }
        if let Some(entry) = batch.put_file_entry {
            state.files.insert(entry.path.clone(), entry);
        }

        debug!(
            nodes = state.nodes.len(),
            edges = state.edges.len(),
            "Applied graph batch"
        );
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<SymbolNode>> {
        self.failures.check_read(STORE)?;
        let state = self.state.read().await;
        let Some(ids) = state.by_name.get(simple_name(name)) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| state.nodes.get(id))
            .filter(|node| name_matches(node, name))
            .cloned()
            .collect())
    }

    async fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<SymbolNode>> {
        self.failures.check_read(STORE)?;
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.nodes.get(id).cloned())
            .collect())
    }

    async fn get_edges(&self, ids: &[EdgeId]) -> Result<Vec<Edge>> {
        self.failures.check_read(STORE)?;
        let state = self.state.read().await;
        Ok(state.edges_for(ids))
    }

    async fn edges_from(&self, sources: &[NodeId], kind: Option<EdgeKind>) -> Result<Vec<Edge>> {
        self.failures.check_read(STORE)?;
        let state = self.state.read().await;
        Ok(sources
            .iter()
            .filter_map(|source| state.outgoing.get(source))
            .flat_map(|ids| state.edges_for(ids))
            .filter(|edge| kind.is_none_or(|k| edge.kind == k))
            .collect())
    }

    async fn edges_targeting(&self, target: &EdgeTargetQuery) -> Result<Vec<Edge>> {
        self.failures.check_read(STORE)?;
        let state = self.state.read().await;
        let edges = match target {
            EdgeTargetQuery::ById(id) => state
                .incoming
                .get(id)
                .map(|ids| state.edges_for(ids))
                .unwrap_or_default(),
            EdgeTargetQuery::ByName(name) => state
                .by_target_name
                .get(simple_name(name))
                .map(|ids| state.edges_for(ids))
                .unwrap_or_default()
                .into_iter()
                .filter(|edge| edge_target_matches(edge, name))
                .collect(),
        };
        Ok(edges)
    }

    async fn unresolved_edges_named(&self, names: &[String]) -> Result<Vec<Edge>> {
        self.failures.check_read(STORE)?;
        let state = self.state.read().await;
        let mut seen = BTreeSet::new();
        Ok(names
            .iter()
            .filter_map(|name| state.pending.get(simple_name(name)))
            .flat_map(|ids| ids.iter())
            .filter(|id| seen.insert((*id).clone()))
            .filter_map(|id| state.edges.get(id).cloned())
            .collect())
    }

    async fn file_entry(&self, path: &str) -> Result<Option<FileIndexEntry>> {
        self.failures.check_read(STORE)?;
        Ok(self.state.read().await.files.get(path).cloned())
    }

    async fn file_entries(&self) -> Result<Vec<FileIndexEntry>> {
        self.failures.check_read(STORE)?;
        Ok(self.state.read().await.files.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::entities::{Direction, Language, SourceSpan, SymbolKind};
    use pretty_assertions::assert_eq;

    fn function(name: &str, file: &str) -> SymbolNode {
        let module = file.trim_end_matches(".py");
        SymbolNode::new(
            SymbolKind::Function,
            name,
            format!("{module}.{name}"),
            file,
            SourceSpan::lines(1, 2),
            Language::Python,
        )
    }

    fn call(from: &SymbolNode, to: &str, line: usize) -> Edge {
        Edge::new(
            EdgeKind::Calls,
            from.id.clone(),
            to,
            from.file.clone(),
            SourceSpan::new(line, 4, line, 10),
        )
    }

    #[tokio::test]
    async fn test_upsert_is_by_identity() {
        let store = InMemoryGraphStore::new();
        let foo = function("foo", "a.py");
        store.upsert_node(foo.clone()).await.unwrap();
        store
            .upsert_node(foo.clone().with_signature(Some("foo(x)".to_string())))
            .await
            .unwrap();

        assert_eq!(store.node_count().await, 1);
        let found = store.find_by_name("foo").await.unwrap();
        assert_eq!(found[0].signature.as_deref(), Some("foo(x)"));
    }

    #[tokio::test]
    async fn test_pending_index_tracks_resolution() {
        let store = InMemoryGraphStore::new();
        let bar = function("bar", "b.py");
        let foo = function("foo", "a.py");
        let edge = call(&bar, "foo", 2);
        store.upsert_edge(edge.clone()).await.unwrap();

        let pending = store
            .unresolved_edges_named(&["foo".to_string()])
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        store
            .upsert_edge(edge.clone().resolved_to(foo.id.clone()))
            .await
            .unwrap();
        assert!(store
            .unresolved_edges_named(&["foo".to_string()])
            .await
            .unwrap()
            .is_empty());
        let incoming = store
            .edges_targeting(&EdgeTargetQuery::ById(foo.id.clone()))
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].id, edge.id);
    }

    #[tokio::test]
    async fn test_traverse_groups_by_depth_and_survives_cycles() {
        let store = InMemoryGraphStore::new();
        let a = function("a", "m.py");
        let b = function("b", "m.py");
        let c = function("c", "m.py");
        let edges = vec![
            call(&a, "b", 3).resolved_to(b.id.clone()),
            call(&b, "c", 6).resolved_to(c.id.clone()),
            call(&c, "a", 9).resolved_to(a.id.clone()),
            call(&a, "a", 4).resolved_to(a.id.clone()),
        ];
        store
            .apply_batch(GraphBatch {
                upsert_nodes: vec![a.clone(), b.clone(), c.clone()],
                upsert_edges: edges,
                ..GraphBatch::default()
            })
            .await
            .unwrap();

        let names = |levels: Vec<Vec<SymbolNode>>| -> Vec<Vec<String>> {
            levels
                .into_iter()
                .map(|l| l.into_iter().map(|n| n.name).collect())
                .collect()
        };

        let callees = store
            .traverse(&a.id, EdgeKind::Calls, Direction::Forward, 5)
            .await
            .unwrap();
        assert_eq!(
            names(callees),
            vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]]
        );

        let callers = store
            .traverse(&a.id, EdgeKind::Calls, Direction::Reverse, 1)
            .await
            .unwrap();
        assert_eq!(names(callers), vec![vec!["a".to_string(), "c".to_string()]]);
    }

    #[tokio::test]
    async fn test_deletes_prune_file_entries() {
        let store = InMemoryGraphStore::new();
        let foo = function("foo", "a.py");
        let edge = call(&foo, "print", 1);
        let entry = FileIndexEntry {
            path: "a.py".to_string(),
            fingerprint: "f1".to_string(),
            language: Language::Python,
            node_ids: [foo.id.clone()].into_iter().collect(),
            edge_ids: [edge.id.clone()].into_iter().collect(),
            degraded: false,
        };
        store
            .apply_batch(GraphBatch {
                upsert_nodes: vec![foo.clone()],
                upsert_edges: vec![edge.clone()],
                put_file_entry: Some(entry),
                ..GraphBatch::default()
            })
            .await
            .unwrap();

        store.delete_edges(&[edge.id.clone()]).await.unwrap();
        let entry = store.file_entry("a.py").await.unwrap().unwrap();
        assert!(entry.edge_ids.is_empty());
        assert_eq!(entry.node_ids.len(), 1);

        // An edge written on the file's behalf by another merge joins its entry
        let later = call(&foo, "len", 2);
        store.upsert_edge(later.clone()).await.unwrap();
        let entry = store.file_entry("a.py").await.unwrap().unwrap();
        assert_eq!(entry.edge_ids.into_iter().collect::<Vec<_>>(), vec![later.id]);
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_state_untouched() {
        let store = InMemoryGraphStore::new();
        store.fail_next_batches(1);
        let err = store.upsert_node(function("foo", "a.py")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.node_count().await, 0);

        store.upsert_node(function("foo", "a.py")).await.unwrap();
        assert_eq!(store.node_count().await, 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_reads() {
        let store = InMemoryGraphStore::new();
        store.set_available(false);
        assert!(store.find_by_name("foo").await.is_err());
        store.set_available(true);
        assert!(store.find_by_name("foo").await.unwrap().is_empty());
    }
}
