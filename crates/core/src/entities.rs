//! Canonical graph model shared by extraction, sync and query
//!
//! Every language is normalized into the same small vocabulary of symbol
//! kinds and edge kinds. Identities are derived deterministically (see
//! [`crate::entity_id`]) so re-extracting an unchanged file reproduces them.

use crate::entity_id::{generate_edge_id, generate_node_id};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use strum_macros::{Display, EnumString};

/// Stable identity of a [`SymbolNode`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of an [`Edge`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a definable code entity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Type,
    Function,
    Method,
    Field,
    Interface,
}

impl SymbolKind {
    /// Functions and methods, the endpoints of `calls` edges
    pub fn is_callable(self) -> bool {
        matches!(self, Self::Function | Self::Method)
    }

    /// Types and interfaces, the endpoints of `inherits`/`implements` edges
    pub fn is_type_like(self) -> bool {
        matches!(self, Self::Type | Self::Interface)
    }
}

/// Kind of a directed relationship between symbols
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EdgeKind {
    Calls,
    References,
    Inherits,
    Implements,
    Imports,
    Overrides,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 6] = [
        Self::Calls,
        Self::References,
        Self::Inherits,
        Self::Implements,
        Self::Imports,
        Self::Overrides,
    ];

    /// Whether a node of `kind` is a plausible target for this edge kind
    pub fn accepts_target(self, kind: SymbolKind) -> bool {
        match self {
            Self::Calls => kind.is_callable() || kind == SymbolKind::Type,
            Self::Inherits | Self::Implements => kind.is_type_like(),
            Self::Overrides => kind.is_callable(),
            Self::References => kind != SymbolKind::Module,
            Self::Imports => true,
        }
    }

    /// `inherits` or `implements`
    pub fn is_hierarchy(self) -> bool {
        matches!(self, Self::Inherits | Self::Implements)
    }
}

/// Traversal direction along edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    /// From source to target (callees)
    Forward,
    /// From target to source (callers)
    Reverse,
}

/// Programming language tag
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Language {
    Rust,
    Python,
    #[strum(serialize = "javascript", serialize = "js")]
    JavaScript,
    #[strum(serialize = "typescript", serialize = "ts")]
    TypeScript,
    Tsx,
    Go,
    Java,
    Kotlin,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Scala,
    Unknown,
}

impl Language {
    /// Infer the language tag from a file extension (without the dot)
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "rs" => Self::Rust,
            "py" | "pyi" => Self::Python,
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "ts" | "mts" | "cts" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "go" => Self::Go,
            "java" => Self::Java,
            "kt" | "kts" => Self::Kotlin,
            "c" | "h" => Self::C,
            "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => Self::Cpp,
            "cs" => Self::CSharp,
            "rb" => Self::Ruby,
            "php" => Self::Php,
            "swift" => Self::Swift,
            "scala" | "sc" => Self::Scala,
            _ => Self::Unknown,
        }
    }

    /// Infer the language tag from a path's extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Separator used when joining qualified names
    pub fn separator(self) -> &'static str {
        match self {
            Self::Rust | Self::Cpp => "::",
            _ => ".",
        }
    }
}

/// Source span with 1-based lines and 0-based columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct SourceSpan {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceSpan {
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Create a span from tree-sitter node positions
    pub fn from_tree_sitter_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();

        Self {
            start_line: start.row + 1,
            start_column: start.column,
            end_line: end.row + 1,
            end_column: end.column,
        }
    }

    /// A span covering whole lines `start..=end`
    pub fn lines(start_line: usize, end_line: usize) -> Self {
        Self::new(start_line, 0, end_line, 0)
    }

    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// One definable code entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolNode {
    pub id: NodeId,
    pub kind: SymbolKind,
    /// Simple name, e.g. `process`
    pub name: String,
    /// Name including module path and enclosing scopes, e.g. `billing::Invoice::process`
    pub qualified_name: String,
    /// Workspace-relative path of the declaring file, `/`-separated
    pub file: String,
    pub span: SourceSpan,
    /// Normalized signature, `name(param: Type, ...) -> Ret`
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub language: Language,
    /// Hash of the symbol's source text; changes when only the body changes
    pub body_fingerprint: String,
    /// Produced by the line-based fallback extractor
    #[serde(default)]
    pub degraded: bool,
}

impl SymbolNode {
    /// Create a node, deriving its identity from `(qualified_name, kind, file)`
    pub fn new(
        kind: SymbolKind,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        file: impl Into<String>,
        span: SourceSpan,
        language: Language,
    ) -> Self {
        let qualified_name = qualified_name.into();
        let file = file.into();
        Self {
            id: generate_node_id(&qualified_name, kind, &file),
            kind,
            name: name.into(),
            qualified_name,
            file,
            span,
            signature: None,
            docstring: None,
            language,
            body_fingerprint: String::new(),
            degraded: false,
        }
    }

    pub fn with_signature(mut self, signature: Option<String>) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_docstring(mut self, docstring: Option<String>) -> Self {
        self.docstring = docstring;
        self
    }

    pub fn with_body_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.body_fingerprint = fingerprint.into();
        self
    }

    pub fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }
}

/// Target of an edge: always named, resolved when a matching node is known
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeTarget {
    /// Name as written at the referencing site (last path segment)
    pub name: String,
    /// Resolved node identity, `None` while pending
    pub resolved: Option<NodeId>,
}

impl EdgeTarget {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved: None,
        }
    }

    pub fn resolved(name: impl Into<String>, id: NodeId) -> Self {
        Self {
            name: name.into(),
            resolved: Some(id),
        }
    }
}

/// A directed relationship from a symbol to a (possibly unresolved) target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub kind: EdgeKind,
    pub source: NodeId,
    pub target: EdgeTarget,
    /// File that owns the edge (the source node's declaring file)
    pub file: String,
    /// Span of the referencing site
    pub site: SourceSpan,
    /// Position among the candidates of an ambiguous resolution, 0 otherwise
    #[serde(default)]
    pub ordinal: u32,
}

impl Edge {
    /// Create an unresolved edge. The identity does not depend on resolution.
    pub fn new(
        kind: EdgeKind,
        source: NodeId,
        target_name: impl Into<String>,
        file: impl Into<String>,
        site: SourceSpan,
    ) -> Self {
        Self::with_ordinal(kind, source, target_name, file, site, 0)
    }

    pub fn with_ordinal(
        kind: EdgeKind,
        source: NodeId,
        target_name: impl Into<String>,
        file: impl Into<String>,
        site: SourceSpan,
        ordinal: u32,
    ) -> Self {
        let target_name = target_name.into();
        Self {
            id: generate_edge_id(&source, kind, &target_name, &site, ordinal),
            kind,
            source,
            target: EdgeTarget::unresolved(target_name),
            file: file.into(),
            site,
            ordinal,
        }
    }

    /// Same edge, pointing at `id`
    pub fn resolved_to(mut self, id: NodeId) -> Self {
        self.target.resolved = Some(id);
        self
    }

    /// Same edge, pending again
    pub fn unresolve(mut self) -> Self {
        self.target.resolved = None;
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.target.resolved.is_some()
    }

    pub fn target_id(&self) -> Option<&NodeId> {
        self.target.resolved.as_ref()
    }
}

/// Last-indexed state of one workspace file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIndexEntry {
    /// Workspace-relative path, `/`-separated
    pub path: String,
    /// Content hash of the indexed version
    pub fingerprint: String,
    pub language: Language,
    pub node_ids: BTreeSet<NodeId>,
    pub edge_ids: BTreeSet<EdgeId>,
    #[serde(default)]
    pub degraded: bool,
}

impl FileIndexEntry {
    /// Entry describing the given extraction result
    pub fn from_record(record: &ExtractionRecord, fingerprint: impl Into<String>) -> Self {
        Self {
            path: record.file.clone(),
            fingerprint: fingerprint.into(),
            language: record.language,
            node_ids: record.node_ids(),
            edge_ids: record.edge_ids(),
            degraded: record.degraded,
        }
    }
}

/// Searchable metadata stored beside a vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPayload {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub file: String,
    pub signature: Option<String>,
    /// Hash of the text the vector was computed from
    pub text_hash: String,
}

impl EmbeddingPayload {
    pub fn for_node(node: &SymbolNode, text_hash: impl Into<String>) -> Self {
        Self {
            name: node.name.clone(),
            qualified_name: node.qualified_name.clone(),
            kind: node.kind,
            file: node.file.clone(),
            signature: node.signature.clone(),
            text_hash: text_hash.into(),
        }
    }
}

/// The current vector of one symbol, keyed by the symbol's identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub node_id: NodeId,
    pub vector: Vec<f32>,
    pub payload: EmbeddingPayload,
}

/// Details of a non-fatal parse problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailureInfo {
    pub message: String,
    /// First line with a syntax error, when known
    pub line: Option<usize>,
}

/// Language-agnostic extraction result for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub file: String,
    pub language: Language,
    pub nodes: Vec<SymbolNode>,
    pub edges: Vec<Edge>,
    /// Produced by the line-based fallback extractor
    pub degraded: bool,
    /// Set when the record is partial
    pub failure: Option<ParseFailureInfo>,
}

impl ExtractionRecord {
    pub fn empty(file: impl Into<String>, language: Language) -> Self {
        Self {
            file: file.into(),
            language,
            nodes: Vec::new(),
            edges: Vec::new(),
            degraded: false,
            failure: None,
        }
    }

    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn edge_ids(&self) -> BTreeSet<EdgeId> {
        self.edges.iter().map(|e| e.id.clone()).collect()
    }

    pub fn is_partial(&self) -> bool {
        self.failure.is_some()
    }

    pub fn node(&self, id: &NodeId) -> Option<&SymbolNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_node_identity_is_deterministic() {
        let span = SourceSpan::lines(1, 3);
        let a = SymbolNode::new(SymbolKind::Function, "foo", "a.foo", "a.py", span, Language::Python);
        let b = SymbolNode::new(
            SymbolKind::Function,
            "foo",
            "a.foo",
            "a.py",
            SourceSpan::lines(10, 12),
            Language::Python,
        );
        assert_eq!(a.id, b.id);

        let other_file =
            SymbolNode::new(SymbolKind::Function, "foo", "a.foo", "b.py", span, Language::Python);
        assert_ne!(a.id, other_file.id);

        let other_kind =
            SymbolNode::new(SymbolKind::Method, "foo", "a.foo", "a.py", span, Language::Python);
        assert_ne!(a.id, other_kind.id);
    }

    #[test]
    fn test_edge_identity_survives_resolution() {
        let source = NodeId::new("sym-1");
        let edge = Edge::new(
            EdgeKind::Calls,
            source,
            "foo",
            "b.py",
            SourceSpan::new(4, 4, 4, 9),
        );
        let resolved = edge.clone().resolved_to(NodeId::new("sym-2"));
        assert_eq!(edge.id, resolved.id);
        assert!(resolved.is_resolved());
        assert!(!resolved.unresolve().is_resolved());
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_path(Path::new("src/lib.rs")), Language::Rust);
        assert_eq!(Language::from_path(Path::new("app/view.TSX")), Language::Tsx);
        assert_eq!(Language::from_path(Path::new("Main.java")), Language::Java);
        assert_eq!(Language::from_path(Path::new("README")), Language::Unknown);
        assert_eq!(Language::from_str("js").ok(), Some(Language::JavaScript));
        assert_eq!(Language::from_str("Python").ok(), Some(Language::Python));
    }

    #[test]
    fn test_kind_names_round_trip_through_strings() {
        assert_eq!(SymbolKind::Interface.to_string(), "interface");
        assert_eq!(EdgeKind::from_str("overrides").ok(), Some(EdgeKind::Overrides));
    }

    #[test]
    fn test_edge_kind_target_compatibility() {
        assert!(EdgeKind::Calls.accepts_target(SymbolKind::Method));
        assert!(!EdgeKind::Calls.accepts_target(SymbolKind::Field));
        assert!(EdgeKind::Implements.accepts_target(SymbolKind::Interface));
        assert!(!EdgeKind::Inherits.accepts_target(SymbolKind::Function));
    }
}
