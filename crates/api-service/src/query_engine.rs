//! Graph queries: goto, callers, callees, refs and sig
//!
//! These only touch the graph store and keep working while the vector
//! store is down. Semantic search lives in `semantic_search`.

use crate::models::{
    CallGraphResult, CallLevel, GotoResult, Reference, RefsResult, SignatureResult,
};
use codegraph_core::config::{QueryConfig, ResolutionConfig};
use codegraph_core::entities::{Direction, Edge, EdgeKind, EdgeId, NodeId, SymbolNode};
use codegraph_core::error::{Error, Result};
use codegraph_core::resolution::{rank_candidates, TieBreak};
use codegraph_core::signature::SignaturePattern;
use codegraph_embeddings::EmbeddingManager;
use codegraph_storage::{
    edge_target_matches, simple_name, EdgeTargetQuery, GraphStore, VectorStore,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Read-only query operations over the graph and vector stores
pub struct QueryEngine {
    pub(crate) graph: Arc<dyn GraphStore>,
    pub(crate) vectors: Arc<dyn VectorStore>,
    pub(crate) embeddings: Arc<EmbeddingManager>,
    pub(crate) config: QueryConfig,
    tie_break: TieBreak,
}

impl QueryEngine {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
        embeddings: Arc<EmbeddingManager>,
        config: QueryConfig,
        resolution: &ResolutionConfig,
    ) -> Self {
        Self {
            graph,
            vectors,
            embeddings,
            config,
            tie_break: resolution.tie_break,
        }
    }

    /// Definitions answering `name`: simple, qualified or a qualified suffix
    pub async fn goto(&self, name: &str) -> Result<GotoResult> {
        let name = require_name(name)?;
        let symbols = self.lookup(name).await?;
        Ok(GotoResult {
            query: name.to_string(),
            symbols,
        })
    }

    /// Who calls `name`, grouped by distance
    ///
    /// The sources of pending calls to `name` count as direct callers, and
    /// the walk goes on from them like from any other caller.
    pub async fn callers(&self, name: &str, depth: usize) -> Result<CallGraphResult> {
        self.call_graph(name, depth, Direction::Reverse).await
    }

    /// What `name` calls, grouped by distance
    ///
    /// Each level also names the calls that do not resolve to an indexed
    /// symbol.
    pub async fn callees(&self, name: &str, depth: usize) -> Result<CallGraphResult> {
        self.call_graph(name, depth, Direction::Forward).await
    }

    /// Every edge pointing at `name`, resolved or still pending
    pub async fn refs(&self, name: &str) -> Result<RefsResult> {
        let name = require_name(name)?;
        let targets = self.lookup(name).await?;

        let mut edges: HashMap<EdgeId, Edge> = HashMap::new();
        for target in &targets {
            for edge in self
                .graph
                .edges_targeting(&EdgeTargetQuery::ById(target.id.clone()))
                .await?
            {
                edges.insert(edge.id.clone(), edge);
            }
        }
        for edge in self
            .graph
            .edges_targeting(&EdgeTargetQuery::ByName(name.to_string()))
            .await?
        {
            if !edge.is_resolved() {
                edges.insert(edge.id.clone(), edge);
            }
        }

        let source_ids: Vec<NodeId> = edges
            .values()
            .map(|e| e.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let sources: HashMap<NodeId, SymbolNode> = self
            .graph
            .get_nodes(&source_ids)
            .await?
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();

        let mut references: Vec<Reference> = edges
            .into_values()
            .map(|edge| Reference {
                source: sources.get(&edge.source).cloned(),
                edge,
            })
            .collect();
        references.sort_by(|a, b| {
            a.edge
                .file
                .cmp(&b.edge.file)
                .then(a.edge.site.cmp(&b.edge.site))
                .then(a.edge.ordinal.cmp(&b.edge.ordinal))
        });

        Ok(RefsResult {
            query: name.to_string(),
            targets,
            references,
        })
    }

    /// Symbols whose signature has the shape of `pattern`, e.g.
    /// `process(int, String)` or `load(*, Path) -> Config`
    pub async fn sig(&self, pattern: &str) -> Result<SignatureResult> {
        let parsed: SignaturePattern = pattern.parse()?;
        let name = require_name(&parsed.name)?.to_string();

        // Stored signatures carry the simple name
        let shape_pattern = SignaturePattern {
            name: simple_name(&name).to_string(),
            ..parsed
        };
        let mut symbols: Vec<SymbolNode> = self
            .graph
            .find_by_name(&name)
            .await?
            .into_iter()
            .filter(|node| {
                node.signature
                    .as_deref()
                    .is_some_and(|s| shape_pattern.matches_signature(s))
            })
            .collect();
        rank_candidates(&mut symbols, &name, None, self.tie_break);

        Ok(SignatureResult {
            pattern: pattern.to_string(),
            symbols,
        })
    }

    async fn lookup(&self, name: &str) -> Result<Vec<SymbolNode>> {
        let mut symbols = self.graph.find_by_name(name).await?;
        rank_candidates(&mut symbols, name, None, self.tie_break);
        Ok(symbols)
    }

    fn clamp_depth(&self, depth: usize) -> Result<usize> {
        if depth == 0 {
            return Err(Error::invalid_input("depth must be at least 1"));
        }
        let max_depth = self.config.max_depth.max(1);
        if depth > max_depth {
            debug!(depth, max_depth, "Clamping traversal depth");
        }
        Ok(depth.min(max_depth))
    }

    async fn call_graph(
        &self,
        name: &str,
        depth: usize,
        direction: Direction,
    ) -> Result<CallGraphResult> {
        let name = require_name(name)?;
        let depth = self.clamp_depth(depth)?;
        let roots: Vec<SymbolNode> = self
            .lookup(name)
            .await?
            .into_iter()
            .filter(|n| n.kind.is_callable())
            .collect();

        // Each walk is (levels skipped, levels found); a symbol belongs to
        // the shallowest level any walk reaches it at
        let mut walks: Vec<(usize, Vec<Vec<SymbolNode>>)> = Vec::with_capacity(roots.len());
        for root in &roots {
            let walk = self
                .graph
                .traverse(&root.id, EdgeKind::Calls, direction, depth)
                .await?;
            walks.push((0, walk));
        }
        if matches!(direction, Direction::Reverse) {
            let pending = self.pending_callers(name).await?;
            if depth > 1 {
                for caller in &pending {
                    let walk = self
                        .graph
                        .traverse(&caller.id, EdgeKind::Calls, direction, depth - 1)
                        .await?;
                    walks.push((1, walk));
                }
            }
            walks.push((0, vec![pending]));
        }

        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut levels: Vec<CallLevel> = (1..=depth)
            .map(|d| CallLevel {
                depth: d,
                symbols: Vec::new(),
                unresolved: Vec::new(),
            })
            .collect();
        for (index, level) in levels.iter_mut().enumerate() {
            for (skipped, walk) in &walks {
                let found = index.checked_sub(*skipped).and_then(|i| walk.get(i));
                for node in found.into_iter().flatten() {
                    if seen.insert(node.id.clone()) {
                        level.symbols.push(node.clone());
                    }
                }
            }
        }

        if matches!(direction, Direction::Forward) {
            self.add_pending_callees(&roots, &mut levels).await?;
        }

        for level in &mut levels {
            level
                .symbols
                .sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
        }
        while levels
            .last()
            .is_some_and(|l| l.symbols.is_empty() && l.unresolved.is_empty())
        {
            levels.pop();
        }

        Ok(CallGraphResult {
            query: name.to_string(),
            roots,
            levels,
        })
    }

    /// Sources of calls to `name` that no indexed symbol answers yet
    async fn pending_callers(&self, name: &str) -> Result<Vec<SymbolNode>> {
        let sources: Vec<NodeId> = self
            .graph
            .unresolved_edges_named(&[name.to_string()])
            .await?
            .into_iter()
            .filter(|e| e.kind == EdgeKind::Calls && edge_target_matches(e, name))
            .map(|e| e.source)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        self.graph.get_nodes(&sources).await
    }

    async fn add_pending_callees(&self, roots: &[SymbolNode], levels: &mut [CallLevel]) -> Result<()> {
        let mut callers: Vec<NodeId> = roots.iter().map(|r| r.id.clone()).collect();
        for index in 0..levels.len() {
            if callers.is_empty() {
                break;
            }
            let names: BTreeSet<String> = self
                .graph
                .edges_from(&callers, Some(EdgeKind::Calls))
                .await?
                .into_iter()
                .filter(|e| !e.is_resolved())
                .map(|e| e.target.name)
                .collect();
            levels[index].unresolved = names.into_iter().collect();
            callers = levels[index].symbols.iter().map(|s| s.id.clone()).collect();
        }
        Ok(())
    }
}

fn require_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid_input("a symbol name is required"));
    }
    Ok(name)
}
