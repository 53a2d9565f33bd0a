//! Merging one file's extraction result into the shared graph
//!
//! A merge diffs the new [`ExtractionRecord`] against the file's previous
//! [`FileIndexEntry`]: identities present before but not now are retracted,
//! everything else is upserted by identity. Edges the extractor could not
//! resolve inside the file are resolved against the whole graph. Edges
//! elsewhere that name one of the file's symbols, pending or resolved by
//! that same fallback, are re-ranked over every candidate, and edges
//! elsewhere that pointed at a retracted symbol fall back to the remaining
//! candidates or become pending again. All of it goes to the store as one
//! atomic batch together with the new file entry.

use codegraph_core::config::ResolutionConfig;
use codegraph_core::entities::{
    Edge, EdgeId, ExtractionRecord, FileIndexEntry, NodeId, SymbolNode,
};
use codegraph_core::error::{Error, Result};
use codegraph_core::resolution::{rank_candidates, TieBreak};
use codegraph_storage::{name_matches, simple_name, EdgeTargetQuery, GraphBatch, GraphStore};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Deltas produced by one merge or file deletion
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub nodes_added: usize,
    pub nodes_updated: usize,
    pub nodes_retracted: usize,
    pub edges_added: usize,
    pub edges_updated: usize,
    pub edges_retracted: usize,
    /// Pending edges owned by other files that now resolve into this file
    pub edges_relinked: usize,
    /// Edges owned by other files that lost their target and are pending again
    pub edges_reverted: usize,
    /// Unresolved names that matched more than one symbol graph-wide
    pub ambiguous_resolutions: usize,
    pub identity_conflicts: usize,
    /// Nodes that are new or whose attributes changed; these need embedding
    pub changed_nodes: Vec<SymbolNode>,
    pub retracted_nodes: Vec<NodeId>,
}

impl MergeOutcome {
    /// Whether the merge changed nothing this file owns
    pub fn is_noop(&self) -> bool {
        self.nodes_added == 0
            && self.nodes_updated == 0
            && self.nodes_retracted == 0
            && self.edges_added == 0
            && self.edges_updated == 0
            && self.edges_retracted == 0
    }
}

/// Applies extraction results to a [`GraphStore`]
///
/// Merges are serialized within one `GraphSync`: resolution reads the graph
/// and then writes, and two files that reference each other must not both
/// miss the other's symbols.
pub struct GraphSync {
    store: Arc<dyn GraphStore>,
    tie_break: TieBreak,
    max_candidates: usize,
    merge_lock: Mutex<()>,
}

impl GraphSync {
    pub fn new(store: Arc<dyn GraphStore>, config: &ResolutionConfig) -> Self {
        Self {
            store,
            tie_break: config.tie_break,
            max_candidates: config.max_candidates.max(1),
            merge_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Merge `record` for a file whose content hashes to `fingerprint`
    ///
    /// `previous` is the file's current entry, if it was indexed before. On
    /// error nothing was written and the old entry (with its old
    /// fingerprint) is still in place.
    pub async fn merge(
        &self,
        record: &ExtractionRecord,
        fingerprint: &str,
        previous: Option<&FileIndexEntry>,
    ) -> Result<MergeOutcome> {
        let _guard = self.merge_lock.lock().await;
        let file = record.file.as_str();
        let mut outcome = MergeOutcome::default();
        let mut batch = GraphBatch::default();

        // Nodes: upsert by identity, retract the set difference
        let new_node_ids = record.node_ids();
        let record_ids: Vec<NodeId> = new_node_ids.iter().cloned().collect();
        let stored: HashMap<NodeId, SymbolNode> = self
            .store
            .get_nodes(&record_ids)
            .await?
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();

        for node in &record.nodes {
            match stored.get(&node.id) {
                None => {
                    outcome.nodes_added += 1;
                    outcome.changed_nodes.push(node.clone());
                    batch.upsert_nodes.push(node.clone());
                }
                Some(existing) => {
                    if existing.file != node.file {
                        outcome.identity_conflicts += 1;
                        let conflict =
                            Error::stale_identity_conflict(node.id.as_str(), &existing.file, file);
                        warn!(error = %conflict, "Identity conflict, last write wins");
                    }
                    if existing != node {
                        outcome.nodes_updated += 1;
                        outcome.changed_nodes.push(node.clone());
                        batch.upsert_nodes.push(node.clone());
                    }
                }
            }
        }

        let retracted: Vec<NodeId> = previous
            .map(|entry| entry.node_ids.difference(&new_node_ids).cloned().collect())
            .unwrap_or_default();
        let excluded: HashSet<NodeId> = retracted.iter().cloned().collect();

        // Edges: resolve what the file could not resolve on its own
        let mut lookups = NameLookups::default();
        let mut final_edges: Vec<Edge> = Vec::with_capacity(record.edges.len());
        for edge in &record.edges {
            if edge.is_resolved() {
                final_edges.push(edge.clone());
                continue;
            }
            let candidates = self
                .candidates(edge, file, &record.nodes, &excluded, &mut lookups)
                .await?;
            if candidates.is_empty() {
                final_edges.push(edge.clone());
                continue;
            }
            if candidates.len() > 1 {
                outcome.ambiguous_resolutions += 1;
            }
            for (ordinal, candidate) in candidates.into_iter().enumerate() {
                let resolved = if ordinal == 0 {
                    edge.clone()
                } else {
                    Edge::with_ordinal(
                        edge.kind,
                        edge.source.clone(),
                        edge.target.name.clone(),
                        edge.file.clone(),
                        edge.site,
                        ordinal as u32,
                    )
                };
                final_edges.push(resolved.resolved_to(candidate.id));
            }
        }

        let final_ids: BTreeSet<EdgeId> = final_edges.iter().map(|e| e.id.clone()).collect();
        let lookup_ids: Vec<EdgeId> = final_ids.iter().cloned().collect();
        let stored_edges: HashMap<EdgeId, Edge> = self
            .store
            .get_edges(&lookup_ids)
            .await?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        for edge in final_edges {
            match stored_edges.get(&edge.id) {
                None => {
                    outcome.edges_added += 1;
                    batch.upsert_edges.push(edge);
                }
                Some(existing) if *existing != edge => {
                    outcome.edges_updated += 1;
                    batch.upsert_edges.push(edge);
                }
                Some(_) => {}
            }
        }

        let retracted_edges: Vec<EdgeId> = previous
            .map(|entry| entry.edge_ids.difference(&final_ids).cloned().collect())
            .unwrap_or_default();

        // Edges elsewhere that this file's symbols may answer
        let mut handled = HashSet::new();
        self.relink_pending(
            file,
            record,
            &excluded,
            &mut lookups,
            &mut handled,
            &mut batch,
            &mut outcome,
        )
        .await?;

        // Edges elsewhere that pointed at symbols this file no longer has
        self.revert_dependents(
            file,
            &record.nodes,
            &retracted,
            &excluded,
            &mut lookups,
            &mut handled,
            &mut batch,
            &mut outcome,
        )
        .await?;

        outcome.nodes_retracted = retracted.len();
        outcome.edges_retracted = retracted_edges.len();
        outcome.retracted_nodes = retracted.clone();
        batch.delete_nodes = retracted;
        batch.delete_edges.extend(retracted_edges);
        batch.put_file_entry = Some(FileIndexEntry {
            path: record.file.clone(),
            fingerprint: fingerprint.to_string(),
            language: record.language,
            node_ids: new_node_ids,
            edge_ids: final_ids,
            degraded: record.degraded,
        });

        self.store.apply_batch(batch).await?;

        debug!(
            file_path = %file,
            nodes_added = outcome.nodes_added,
            nodes_updated = outcome.nodes_updated,
            nodes_retracted = outcome.nodes_retracted,
            edges_added = outcome.edges_added,
            edges_retracted = outcome.edges_retracted,
            edges_relinked = outcome.edges_relinked,
            edges_reverted = outcome.edges_reverted,
            "Merged file"
        );
        Ok(outcome)
    }

    /// Retract everything `entry` owns and remove the entry
    pub async fn remove_file(&self, entry: &FileIndexEntry) -> Result<MergeOutcome> {
        let _guard = self.merge_lock.lock().await;
        let file = entry.path.as_str();
        let mut outcome = MergeOutcome::default();
        let mut batch = GraphBatch::default();

        let retracted: Vec<NodeId> = entry.node_ids.iter().cloned().collect();
        let excluded: HashSet<NodeId> = retracted.iter().cloned().collect();
        let mut lookups = NameLookups::default();

        self.revert_dependents(
            file,
            &[],
            &retracted,
            &excluded,
            &mut lookups,
            &mut HashSet::new(),
            &mut batch,
            &mut outcome,
        )
        .await?;

        outcome.nodes_retracted = retracted.len();
        outcome.edges_retracted = entry.edge_ids.len();
        outcome.retracted_nodes = retracted.clone();
        batch.delete_nodes = retracted;
        batch.delete_edges.extend(entry.edge_ids.iter().cloned());
        batch.remove_file_entry = Some(entry.path.clone());

        self.store.apply_batch(batch).await?;

        debug!(
            file_path = %file,
            nodes_retracted = outcome.nodes_retracted,
            edges_retracted = outcome.edges_retracted,
            edges_reverted = outcome.edges_reverted,
            "Removed file"
        );
        Ok(outcome)
    }

    /// Ranked graph-wide candidates for an unresolved edge of `file`
    ///
    /// Stored nodes of `file` itself are stale and replaced by `local`, the
    /// file's freshly extracted nodes. Nodes in `excluded` are about to be
    /// retracted.
    async fn candidates(
        &self,
        edge: &Edge,
        file: &str,
        local: &[SymbolNode],
        excluded: &HashSet<NodeId>,
        lookups: &mut NameLookups,
    ) -> Result<Vec<SymbolNode>> {
        let stored = lookups.find(self.store.as_ref(), &edge.target.name).await?;
        let mut candidates: Vec<SymbolNode> = stored
            .iter()
            .filter(|n| n.file != file && !excluded.contains(&n.id))
            .chain(local.iter())
            .filter(|n| plausible_target(edge, n))
            .cloned()
            .collect();

        rank_candidates(
            &mut candidates,
            &edge.target.name,
            Some(&edge.file),
            self.tie_break,
        );
        candidates.truncate(self.max_candidates);
        Ok(candidates)
    }

    /// Re-rank foreign edges that name one of the file's symbols
    ///
    /// Pending edges and edges resolved by graph-wide fallback both count:
    /// a symbol arriving now may be one more candidate for them. Edges the
    /// extractor resolved inside their own file are left alone.
    #[allow(clippy::too_many_arguments)]
    async fn relink_pending(
        &self,
        file: &str,
        record: &ExtractionRecord,
        excluded: &HashSet<NodeId>,
        lookups: &mut NameLookups,
        handled: &mut HashSet<EdgeId>,
        batch: &mut GraphBatch,
        outcome: &mut MergeOutcome,
    ) -> Result<()> {
        let names: BTreeSet<&str> = record.nodes.iter().map(|n| n.name.as_str()).collect();

        for name in names {
            let mut groups: HashMap<EdgeId, Vec<Edge>> = HashMap::new();
            for edge in self
                .store
                .edges_targeting(&EdgeTargetQuery::ByName(name.to_string()))
                .await?
            {
                if edge.file != file {
                    groups.entry(group_key(&edge)).or_default().push(edge);
                }
            }

            let stored = lookups.find(self.store.as_ref(), name).await?;
            let local_targets: HashSet<&NodeId> = groups
                .values()
                .flatten()
                .filter_map(|edge| {
                    let target = edge.target_id()?;
                    stored
                        .iter()
                        .any(|n| &n.id == target && n.file == edge.file)
                        .then_some(target)
                })
                .collect();
            let keys: Vec<EdgeId> = groups
                .iter()
                .filter(|(_, group)| {
                    !group
                        .iter()
                        .any(|e| e.target_id().is_some_and(|t| local_targets.contains(t)))
                })
                .map(|(key, _)| key.clone())
                .collect();

            for key in keys {
                if !handled.insert(key.clone()) {
                    continue;
                }
                if let Some(group) = groups.remove(&key) {
                    self.regroup(&group, file, &record.nodes, excluded, lookups, batch, outcome)
                        .await?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn revert_dependents(
        &self,
        file: &str,
        local: &[SymbolNode],
        retracted: &[NodeId],
        excluded: &HashSet<NodeId>,
        lookups: &mut NameLookups,
        handled: &mut HashSet<EdgeId>,
        batch: &mut GraphBatch,
        outcome: &mut MergeOutcome,
    ) -> Result<()> {
        for id in retracted {
            let dependents = self
                .store
                .edges_targeting(&EdgeTargetQuery::ById(id.clone()))
                .await?;
            for edge in dependents {
                let key = group_key(&edge);
                if edge.file == file || !handled.insert(key.clone()) {
                    continue;
                }
                let group: Vec<Edge> = self
                    .store
                    .edges_from(std::slice::from_ref(&edge.source), Some(edge.kind))
                    .await?
                    .into_iter()
                    .filter(|sibling| group_key(sibling) == key)
                    .collect();
                self.regroup(&group, file, local, excluded, lookups, batch, outcome)
                    .await?;
            }
        }
        Ok(())
    }

    /// Rewrite one foreign reference site against the graph as it will be
    /// after this batch
    ///
    /// `group` holds every edge recorded for the site, one per ordinal.
    /// The site ends up with one edge per ranked candidate, or a single
    /// pending edge when nothing matches.
    #[allow(clippy::too_many_arguments)]
    async fn regroup(
        &self,
        group: &[Edge],
        file: &str,
        local: &[SymbolNode],
        excluded: &HashSet<NodeId>,
        lookups: &mut NameLookups,
        batch: &mut GraphBatch,
        outcome: &mut MergeOutcome,
    ) -> Result<()> {
        let Some(first) = group.first() else {
            return Ok(());
        };
        let base = sibling(first, 0);
        let candidates = self
            .candidates(&base, file, local, excluded, lookups)
            .await?;
        let ambiguous = candidates.len() > 1;
        let desired: Vec<Edge> = if candidates.is_empty() {
            vec![base]
        } else {
            candidates
                .into_iter()
                .enumerate()
                .map(|(ordinal, node)| sibling(first, ordinal as u32).resolved_to(node.id))
                .collect()
        };

        let existing: HashMap<&EdgeId, &Edge> = group.iter().map(|e| (&e.id, e)).collect();
        let desired_ids: HashSet<&EdgeId> = desired.iter().map(|e| &e.id).collect();
        let stale: Vec<EdgeId> = group
            .iter()
            .filter(|e| !desired_ids.contains(&e.id))
            .map(|e| e.id.clone())
            .collect();
        let fresh: Vec<Edge> = desired
            .iter()
            .filter(|e| existing.get(&e.id).is_none_or(|current| *current != *e))
            .cloned()
            .collect();
        if stale.is_empty() && fresh.is_empty() {
            return Ok(());
        }

        let was_resolved = group.iter().any(Edge::is_resolved);
        if desired[0].is_resolved() {
            outcome.edges_relinked += 1;
            if ambiguous {
                outcome.ambiguous_resolutions += 1;
            }
        } else if was_resolved {
            outcome.edges_reverted += 1;
        }
        batch.delete_edges.extend(stale);
        batch.upsert_edges.extend(fresh);
        Ok(())
    }
}

/// Identity shared by every ordinal edge of one reference site
fn group_key(edge: &Edge) -> EdgeId {
    sibling(edge, 0).id
}

/// Unresolved edge for the same site as `edge` at `ordinal`
fn sibling(edge: &Edge, ordinal: u32) -> Edge {
    Edge::with_ordinal(
        edge.kind,
        edge.source.clone(),
        edge.target.name.clone(),
        edge.file.clone(),
        edge.site,
        ordinal,
    )
}

/// Whether `node` can be the target of `edge`
fn plausible_target(edge: &Edge, node: &SymbolNode) -> bool {
    name_matches(node, &edge.target.name)
        && edge.kind.accepts_target(node.kind)
        && !(edge.kind.is_hierarchy() && node.id == edge.source)
}

/// Per-merge cache of `find_by_name` results, keyed by simple name
#[derive(Default)]
struct NameLookups {
    by_simple_name: HashMap<String, Vec<SymbolNode>>,
}

impl NameLookups {
    async fn find(&mut self, store: &dyn GraphStore, name: &str) -> Result<&[SymbolNode]> {
        let key = simple_name(name).to_string();
        if !self.by_simple_name.contains_key(&key) {
            let found = store.find_by_name(&key).await?;
            self.by_simple_name.insert(key.clone(), found);
        }
        Ok(self
            .by_simple_name
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::entities::{EdgeKind, Language, SourceSpan, SymbolKind};
    use codegraph_core::entity_id::content_fingerprint;
    use codegraph_storage::InMemoryGraphStore;
    use pretty_assertions::assert_eq;

    fn function(file: &str, module: &str, name: &str, line: usize) -> SymbolNode {
        SymbolNode::new(
            SymbolKind::Function,
            name,
            format!("{module}.{name}"),
            file,
            SourceSpan::lines(line, line + 1),
            Language::Python,
        )
        .with_signature(Some(format!("{name}()")))
    }

    fn record(file: &str, nodes: Vec<SymbolNode>, edges: Vec<Edge>) -> ExtractionRecord {
        let mut record = ExtractionRecord::empty(file, Language::Python);
        record.nodes = nodes;
        record.edges = edges;
        record
    }

    fn call(from: &SymbolNode, target: &str, line: usize) -> Edge {
        Edge::new(
            EdgeKind::Calls,
            from.id.clone(),
            target,
            from.file.clone(),
            SourceSpan::new(line, 4, line, 9),
        )
    }

    fn setup() -> (Arc<InMemoryGraphStore>, GraphSync) {
        let store = Arc::new(InMemoryGraphStore::new());
        let sync = GraphSync::new(store.clone(), &ResolutionConfig::default());
        (store, sync)
    }

    async fn merge(sync: &GraphSync, record: &ExtractionRecord) -> MergeOutcome {
        let previous = sync.store().file_entry(&record.file).await.unwrap();
        sync.merge(record, &content_fingerprint(record.file.as_bytes()), previous.as_ref())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fallback_resolution_across_files() {
        let (store, sync) = setup();
        let foo = function("a.py", "a", "foo", 1);
        merge(&sync, &record("a.py", vec![foo.clone()], vec![])).await;

        let bar = function("b.py", "b", "bar", 1);
        let edge = call(&bar, "foo", 2);
        let outcome = merge(&sync, &record("b.py", vec![bar], vec![edge.clone()])).await;

        assert_eq!(outcome.edges_added, 1);
        let stored = store.get_edges(&[edge.id]).await.unwrap();
        assert_eq!(stored[0].target_id(), Some(&foo.id));
    }

    #[tokio::test]
    async fn test_pending_edge_relinks_when_target_appears() {
        let (store, sync) = setup();
        let bar = function("b.py", "b", "bar", 1);
        let edge = call(&bar, "foo", 2);
        merge(&sync, &record("b.py", vec![bar], vec![edge.clone()])).await;
        assert!(!store.get_edges(&[edge.id.clone()]).await.unwrap()[0].is_resolved());

        let foo = function("a.py", "a", "foo", 1);
        let outcome = merge(&sync, &record("a.py", vec![foo.clone()], vec![])).await;

        assert_eq!(outcome.edges_relinked, 1);
        let stored = store.get_edges(&[edge.id]).await.unwrap();
        assert_eq!(stored[0].target_id(), Some(&foo.id));
    }

    #[tokio::test]
    async fn test_retracted_target_reverts_foreign_edges_to_pending() {
        let (store, sync) = setup();
        let foo = function("a.py", "a", "foo", 1);
        merge(&sync, &record("a.py", vec![foo], vec![])).await;
        let bar = function("b.py", "b", "bar", 1);
        let edge = call(&bar, "foo", 2);
        merge(&sync, &record("b.py", vec![bar.clone()], vec![edge.clone()])).await;

        // foo disappears from a.py
        let other = function("a.py", "a", "other", 1);
        let outcome = merge(&sync, &record("a.py", vec![other], vec![])).await;

        assert_eq!(outcome.nodes_retracted, 1);
        assert_eq!(outcome.nodes_added, 1);
        assert_eq!(outcome.edges_reverted, 1);
        let stored = store.get_edges(&[edge.id]).await.unwrap();
        assert_eq!(stored.len(), 1, "edge owned by b.py must survive");
        assert!(!stored[0].is_resolved());
        assert_eq!(store.get_nodes(&[bar.id]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_fallback_records_every_candidate() {
        let (store, sync) = setup();
        merge(&sync, &record("x.py", vec![function("x.py", "x", "run", 1)], vec![])).await;
        merge(&sync, &record("y.py", vec![function("y.py", "y", "run", 1)], vec![])).await;

        let main = function("main.py", "main", "main", 1);
        let edge = call(&main, "run", 2);
        let outcome = merge(&sync, &record("main.py", vec![main.clone()], vec![edge])).await;

        assert_eq!(outcome.ambiguous_resolutions, 1);
        assert_eq!(outcome.edges_added, 2);
        let mut targets: Vec<String> = store
            .edges_from(&[main.id], Some(EdgeKind::Calls))
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.ordinal, e.target_id().cloned()))
            .map(|(ordinal, id)| format!("{ordinal}:{}", id.map(|i| i.to_string()).unwrap_or_default()))
            .collect();
        targets.sort();
        assert_eq!(targets.len(), 2);
        assert!(targets[0].starts_with("0:"));
        assert!(targets[1].starts_with("1:"));
    }

    async fn call_targets(store: &InMemoryGraphStore, source: &SymbolNode) -> Vec<(u32, String)> {
        let mut targets: Vec<(u32, String)> = store
            .edges_from(std::slice::from_ref(&source.id), Some(EdgeKind::Calls))
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.ordinal, e.target_id().map(|id| id.to_string()).unwrap_or_default()))
            .collect();
        targets.sort();
        targets
    }

    #[tokio::test]
    async fn test_caller_merged_first_gains_every_later_candidate() {
        let (store, sync) = setup();
        let main = function("main.py", "main", "main", 1);
        let edge = call(&main, "run", 2);
        merge(&sync, &record("main.py", vec![main.clone()], vec![edge])).await;

        let x_run = function("x.py", "x", "run", 1);
        let y_run = function("y.py", "y", "run", 1);
        let first = merge(&sync, &record("x.py", vec![x_run.clone()], vec![])).await;
        let second = merge(&sync, &record("y.py", vec![y_run.clone()], vec![])).await;
        assert_eq!(first.edges_relinked, 1);
        assert_eq!((second.edges_relinked, second.ambiguous_resolutions), (1, 1));

        let targets = call_targets(&store, &main).await;
        assert_eq!(targets.iter().map(|(o, _)| *o).collect::<Vec<_>>(), vec![0, 1]);
        let mut ids: Vec<String> = targets.into_iter().map(|(_, id)| id).collect();
        ids.sort();
        let mut expected = vec![x_run.id.to_string(), y_run.id.to_string()];
        expected.sort();
        assert_eq!(ids, expected);

        // The new ordinal edge belongs to main.py
        let entry = store.file_entry("main.py").await.unwrap().unwrap();
        assert_eq!(entry.edge_ids.len(), 2);

        // Merging again changes nothing
        let again = merge(&sync, &record("y.py", vec![y_run], vec![])).await;
        assert_eq!(again.edges_relinked, 0);
    }

    #[tokio::test]
    async fn test_losing_one_candidate_leaves_the_other_once() {
        let (store, sync) = setup();
        let x_run = function("x.py", "x", "run", 1);
        merge(&sync, &record("x.py", vec![x_run.clone()], vec![])).await;
        merge(&sync, &record("y.py", vec![function("y.py", "y", "run", 1)], vec![])).await;
        let main = function("main.py", "main", "main", 1);
        merge(&sync, &record("main.py", vec![main.clone()], vec![call(&main, "run", 2)])).await;
        assert_eq!(call_targets(&store, &main).await.len(), 2);

        let entry = store.file_entry("y.py").await.unwrap().unwrap();
        let outcome = sync.remove_file(&entry).await.unwrap();

        assert_eq!(outcome.edges_relinked, 1);
        assert_eq!(
            call_targets(&store, &main).await,
            vec![(0, x_run.id.to_string())]
        );
        let entry = store.file_entry("main.py").await.unwrap().unwrap();
        assert_eq!(entry.edge_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_locally_resolved_edge_ignores_foreign_namesakes() {
        let (store, sync) = setup();
        let helper = function("a.py", "a", "helper", 1);
        let user = function("a.py", "a", "user", 4);
        let edge = call(&user, "helper", 5).resolved_to(helper.id.clone());
        merge(&sync, &record("a.py", vec![helper.clone(), user.clone()], vec![edge])).await;

        merge(&sync, &record("b.py", vec![function("b.py", "b", "helper", 1)], vec![])).await;

        assert_eq!(
            call_targets(&store, &user).await,
            vec![(0, helper.id.to_string())]
        );
    }

    #[tokio::test]
    async fn test_remerge_of_same_record_is_noop() {
        let (_store, sync) = setup();
        let foo = function("a.py", "a", "foo", 1);
        let bar = function("a.py", "a", "bar", 4);
        let edge = call(&bar, "foo", 5).resolved_to(foo.id.clone());
        let rec = record("a.py", vec![foo, bar], vec![edge]);

        let first = merge(&sync, &rec).await;
        assert_eq!((first.nodes_added, first.edges_added), (2, 1));
        let second = merge(&sync, &rec).await;
        assert!(second.is_noop());
        assert!(second.changed_nodes.is_empty());
    }

    #[tokio::test]
    async fn test_attribute_change_updates_in_place() {
        let (store, sync) = setup();
        let foo = function("a.py", "a", "foo", 1);
        merge(&sync, &record("a.py", vec![foo.clone()], vec![])).await;

        let changed = foo.clone().with_signature(Some("foo(x: int)".to_string()));
        let outcome = merge(&sync, &record("a.py", vec![changed], vec![])).await;

        assert_eq!((outcome.nodes_added, outcome.nodes_updated), (0, 1));
        assert_eq!(store.node_count().await, 1);
        let stored = store.get_nodes(&[foo.id]).await.unwrap();
        assert_eq!(stored[0].signature.as_deref(), Some("foo(x: int)"));
    }

    #[tokio::test]
    async fn test_remove_file_keeps_foreign_nodes() {
        let (store, sync) = setup();
        let foo = function("a.py", "a", "foo", 1);
        merge(&sync, &record("a.py", vec![foo.clone()], vec![])).await;
        let bar = function("b.py", "b", "bar", 1);
        merge(&sync, &record("b.py", vec![bar.clone()], vec![call(&bar, "foo", 2)])).await;

        let entry = store.file_entry("b.py").await.unwrap().unwrap();
        let outcome = sync.remove_file(&entry).await.unwrap();

        assert_eq!((outcome.nodes_retracted, outcome.edges_retracted), (1, 1));
        assert_eq!(store.edge_count().await, 0);
        assert_eq!(store.get_nodes(&[foo.id]).await.unwrap().len(), 1);
        assert!(store.file_entry("b.py").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_previous_entry() {
        let (store, sync) = setup();
        let foo = function("a.py", "a", "foo", 1);
        merge(&sync, &record("a.py", vec![foo.clone()], vec![])).await;
        let before = store.file_entry("a.py").await.unwrap().unwrap();

        store.fail_next_batches(1);
        let changed = record("a.py", vec![function("a.py", "a", "baz", 1)], vec![]);
        let err = sync
            .merge(&changed, "new-fingerprint", Some(&before))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.file_entry("a.py").await.unwrap().unwrap(), before);
        assert_eq!(store.get_nodes(&[foo.id]).await.unwrap().len(), 1);
    }
}
