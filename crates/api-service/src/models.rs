//! Result types returned by the query operations

use codegraph_core::entities::{Edge, NodeId, SymbolKind, SymbolNode};
use serde::Serialize;

/// Symbols found for a name, best match first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GotoResult {
    pub query: String,
    pub symbols: Vec<SymbolNode>,
}

/// Symbols first reachable at one depth of a call-graph walk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallLevel {
    /// 1 for direct callers or callees
    pub depth: usize,
    pub symbols: Vec<SymbolNode>,
    /// Callee names at this depth that no indexed symbol answers yet
    pub unresolved: Vec<String>,
}

/// Result of `callers` or `callees`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallGraphResult {
    pub query: String,
    /// The symbols the walk started from
    pub roots: Vec<SymbolNode>,
    pub levels: Vec<CallLevel>,
}

impl CallGraphResult {
    /// Simple names per level, handy for display and tests
    pub fn names_by_depth(&self) -> Vec<Vec<String>> {
        self.levels
            .iter()
            .map(|level| level.symbols.iter().map(|s| s.name.clone()).collect())
            .collect()
    }
}

/// One edge pointing at a queried name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub edge: Edge,
    /// The referencing symbol, when it is still in the graph
    pub source: Option<SymbolNode>,
}

impl Reference {
    pub fn is_resolved(&self) -> bool {
        self.edge.is_resolved()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefsResult {
    pub query: String,
    /// Symbols the name resolves to
    pub targets: Vec<SymbolNode>,
    /// Resolved and pending references, ordered by file and position
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureResult {
    pub pattern: String,
    pub symbols: Vec<SymbolNode>,
}

/// One ranked semantic search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticHit {
    pub node_id: NodeId,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub file: String,
    pub signature: Option<String>,
    /// Combined ranking score
    pub score: f32,
    /// Cosine similarity reported by the vector store
    pub similarity: f32,
    /// Fraction of query tokens found in the symbol's names and signature
    pub lexical_overlap: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticSearchResult {
    pub query: String,
    pub hits: Vec<SemanticHit>,
    pub metadata: SearchMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMetadata {
    /// Hits requested from the vector store
    pub candidates_fetched: usize,
    /// Hits dropped because their symbol is gone from the graph
    pub stale_hits_dropped: usize,
    pub query_time_ms: u64,
    /// Set when results could not be checked against the graph
    pub warning: Option<String>,
}
