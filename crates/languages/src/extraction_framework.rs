//! Query-driven extraction shared by every grammar adapter
//!
//! The driver parses a file once and runs the adapter's query families over
//! the tree:
//!
//! 1. **Definitions** produce symbols. Qualified names come from the module
//!    path plus the chain of enclosing definitions and naming scopes.
//! 2. **Calls**, **relations**, **imports** and **type references** produce
//!    edges owned by the innermost enclosing symbol (or the file's module).
//! 3. Edges are resolved against same-file symbols first. Ambiguous names
//!    produce one edge per candidate; unknown names stay unresolved for the
//!    graph to resolve later.
//! 4. `overrides` edges are derived from same-file inheritance.

use crate::adapter::{GrammarAdapter, QueryKind};
use crate::common::{
    find_capture_node, find_capture_nodes, find_prefixed_capture, first_error_line,
    last_path_segment, text_or_empty,
};
use codegraph_core::entities::{
    Edge, EdgeKind, ExtractionRecord, NodeId, ParseFailureInfo, SourceSpan, SymbolKind,
    SymbolNode,
};
use codegraph_core::entity_id::{content_fingerprint, derive_module_path, ScopeContext};
use codegraph_core::error::{Error, Result};
use codegraph_core::resolution::{rank_candidates, TieBreak};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, Query, QueryCursor, QueryMatch};
use tracing::debug;

/// Resource limits and resolution policy for one extraction
#[derive(Debug, Clone)]
pub(crate) struct ExtractionOptions {
    pub tie_break: TieBreak,
    pub max_candidates: usize,
    pub parse_timeout_ms: u64,
    pub query_match_limit: u32,
}

/// Compiled queries for one adapter, indexed by [`QueryKind`]
struct CompiledQueries {
    queries: HashMap<QueryKind, Query>,
}

impl CompiledQueries {
    fn compile(adapter: GrammarAdapter) -> std::result::Result<Self, String> {
        let language = adapter.tree_sitter_language();
        let mut queries = HashMap::new();
        for kind in QueryKind::ALL {
            if let Some(source) = adapter.query_source(kind) {
                let query = Query::new(&language, source)
                    .map_err(|e| format!("Failed to compile {kind:?} query for {adapter:?}: {e}"))?;
                queries.insert(kind, query);
            }
        }
        Ok(Self { queries })
    }

    fn get(&self, kind: QueryKind) -> Option<&Query> {
        self.queries.get(&kind)
    }
}

static QUERY_CACHE: [OnceLock<std::result::Result<CompiledQueries, String>>; 6] =
    [const { OnceLock::new() }; 6];

fn compiled_queries(adapter: GrammarAdapter) -> std::result::Result<&'static CompiledQueries, String> {
    QUERY_CACHE[adapter.index()]
        .get_or_init(|| CompiledQueries::compile(adapter))
        .as_ref()
        .map_err(Clone::clone)
}

/// A definition or naming scope located by the definitions query
struct Definition<'tree> {
    node: Node<'tree>,
    name: String,
    /// `None` for scopes that name their contents but are not symbols (`impl` blocks)
    kind: Option<SymbolKind>,
}

/// An edge before same-file resolution
struct EdgeSite {
    kind: EdgeKind,
    source: NodeId,
    target_name: String,
    site: SourceSpan,
}

/// Extract one file with a grammar adapter
pub(crate) fn extract_with_adapter(
    adapter: GrammarAdapter,
    file_path: &str,
    source: &str,
    options: &ExtractionOptions,
) -> Result<ExtractionRecord> {
    let language = adapter.language();
    let queries = compiled_queries(adapter).map_err(|e| Error::parse(file_path, e))?;

    let mut parser = Parser::new();
    parser
        .set_language(&adapter.tree_sitter_language())
        .map_err(|e| Error::parse(file_path, format!("Failed to set language: {e}")))?;
    parser.set_timeout_micros(options.parse_timeout_ms.saturating_mul(1_000));

    let mut record = ExtractionRecord::empty(file_path, language);

    let Some(tree) = parser.parse(source, None) else {
        record.failure = Some(ParseFailureInfo {
            message: format!("parse timed out after {}ms", options.parse_timeout_ms),
            line: None,
        });
        return Ok(record);
    };

    let root = tree.root_node();
    if root.has_error() {
        record.failure = Some(ParseFailureInfo {
            message: "syntax error".to_string(),
            line: first_error_line(root),
        });
    }

    let separator = language.separator();
    let module_path = derive_module_path(file_path, language);
    let module_node = module_symbol(adapter, file_path, module_path.as_deref(), root, source);
    let module_id = module_node.id.clone();
    record.nodes.push(module_node);

    let mut exceeded = false;

    // Definitions
    let mut definitions: Vec<Definition> = Vec::new();
    if let Some(query) = queries.get(QueryKind::Definitions) {
        exceeded |= run_query(query, root, source, options, |m| {
            if let Some(definition) = read_definition(adapter, m, query, source) {
                definitions.push(definition);
            }
        });
    }
    let nested: Vec<Definition> = definitions
        .iter()
        .filter(|d| d.kind.is_some())
        .flat_map(|d| adapter.nested_definitions(d.node, source))
        .map(|(node, name, kind)| Definition {
            node,
            name,
            kind: Some(kind),
        })
        .collect();
    definitions.extend(nested);
    definitions.sort_by_key(|d| (d.node.start_byte(), std::cmp::Reverse(d.node.end_byte())));

    let mut seen_definitions = HashSet::new();
    definitions.retain(|d| seen_definitions.insert((d.node.id(), d.name.clone())));

    let mut scopes: HashMap<usize, usize> = HashMap::new();
    for (index, definition) in definitions.iter().enumerate() {
        scopes.entry(definition.node.id()).or_insert(index);
    }

    // Owner lookup: tree node → symbol that owns edges found inside it
    let mut owners: HashMap<usize, NodeId> = HashMap::new();
    let mut seen_nodes: HashSet<NodeId> = HashSet::new();
    seen_nodes.insert(module_id.clone());

    for definition in &definitions {
        let Some(kind) = definition.kind else {
            continue;
        };
        let ancestors = enclosing_definitions(definition.node, &definitions, &scopes);
        let detached = adapter.detached_scope(definition.node, source);

        let innermost_is_type = ancestors
            .last()
            .is_some_and(|a| a.kind.is_none_or(SymbolKind::is_type_like));
        let kind = if kind == SymbolKind::Function && (innermost_is_type || detached.is_some()) {
            SymbolKind::Method
        } else {
            kind
        };

        let mut scope = ScopeContext::new(module_path.as_deref(), separator);
        for ancestor in &ancestors {
            scope.push_scope(ancestor.name.clone());
        }
        if let Some(receiver) = detached {
            scope.push_scope(receiver);
        }
        let qualified_name = scope.build_qualified_name(&definition.name);

        let node_text = text_or_empty(definition.node, source);
        let signature = if kind.is_callable() {
            adapter.signature(definition.node, &definition.name, kind, source)
        } else {
            None
        };
        let symbol = SymbolNode::new(
            kind,
            definition.name.clone(),
            qualified_name,
            file_path,
            SourceSpan::from_tree_sitter_node(definition.node),
            language,
        )
        .with_signature(signature)
        .with_docstring(adapter.docstring(definition.node, source))
        .with_body_fingerprint(content_fingerprint(node_text.as_bytes()));

        if !seen_nodes.insert(symbol.id.clone()) {
            debug!(
                file_path = %file_path,
                qualified_name = %symbol.qualified_name,
                "Skipping duplicate definition"
            );
            continue;
        }
        if kind != SymbolKind::Field {
            owners.entry(definition.node.id()).or_insert(symbol.id.clone());
        }
        record.nodes.push(symbol);
    }

    let owner_of = |node: Node| -> NodeId {
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(owner) = owners.get(&n.id()) {
                return owner.clone();
            }
            current = n.parent();
        }
        module_id.clone()
    };

    let mut sites: Vec<EdgeSite> = Vec::new();

    // Calls
    if let Some(query) = queries.get(QueryKind::Calls) {
        exceeded |= run_query(query, root, source, options, |m| {
            let (Some(callee), Some(call)) = (
                find_capture_node(m, query, "callee"),
                find_capture_node(m, query, "call"),
            ) else {
                return;
            };
            let name = text_or_empty(callee, source);
            if name.is_empty() {
                return;
            }
            sites.push(EdgeSite {
                kind: EdgeKind::Calls,
                source: owner_of(call),
                target_name: name.to_string(),
                site: SourceSpan::from_tree_sitter_node(call),
            });
        });
    }

    // Inheritance and implementation
    if let Some(query) = queries.get(QueryKind::Relations) {
        exceeded |= run_query(query, root, source, options, |m| {
            let Some((relation, relation_node)) = find_prefixed_capture(m, query, "relation.")
            else {
                return;
            };
            let kind = match relation {
                "inherits" => EdgeKind::Inherits,
                "implements" => EdgeKind::Implements,
                _ => return,
            };
            let source_id = match find_capture_node(m, query, "subject") {
                Some(subject) => {
                    let subject_name = text_or_empty(subject, source);
                    record
                        .nodes
                        .iter()
                        .find(|n| n.kind.is_type_like() && n.name == subject_name)
                        .map(|n| n.id.clone())
                        .unwrap_or_else(|| module_id.clone())
                }
                None => owner_of(relation_node),
            };
            for target in find_capture_nodes(m, query, "target") {
                let name = last_path_segment(text_or_empty(target, source));
                if name.is_empty() || adapter.is_builtin_type(name) {
                    continue;
                }
                sites.push(EdgeSite {
                    kind,
                    source: source_id.clone(),
                    target_name: name.to_string(),
                    site: SourceSpan::from_tree_sitter_node(target),
                });
            }
        });
    }

    // Imports belong to the module and are never resolved in-file
    if let Some(query) = queries.get(QueryKind::Imports) {
        exceeded |= run_query(query, root, source, options, |m| {
            for import in find_capture_nodes(m, query, "import") {
                let name = last_path_segment(text_or_empty(import, source));
                if name.is_empty() || name == "*" {
                    continue;
                }
                sites.push(EdgeSite {
                    kind: EdgeKind::Imports,
                    source: module_id.clone(),
                    target_name: name.to_string(),
                    site: SourceSpan::from_tree_sitter_node(import),
                });
            }
        });
    }

    // Type references
    if let Some(query) = queries.get(QueryKind::TypeRefs) {
        exceeded |= run_query(query, root, source, options, |m| {
            for reference in find_capture_nodes(m, query, "ref") {
                let name = text_or_empty(reference, source);
                if name.is_empty() || adapter.is_builtin_type(name) {
                    continue;
                }
                sites.push(EdgeSite {
                    kind: EdgeKind::References,
                    source: owner_of(reference),
                    target_name: name.to_string(),
                    site: SourceSpan::from_tree_sitter_node(reference),
                });
            }
        });
    }

    let mut edges = resolve_in_file(&sites, &record.nodes, file_path, options);
    edges.extend(derive_overrides(&edges, &record.nodes, file_path, separator));

    let mut seen_edges = HashSet::new();
    edges.retain(|e| seen_edges.insert(e.id.clone()));
    record.edges = edges;

    if exceeded && record.failure.is_none() {
        record.failure = Some(ParseFailureInfo {
            message: "query match limit exceeded, results are incomplete".to_string(),
            line: None,
        });
    }

    debug!(
        file_path = %file_path,
        nodes = record.nodes.len(),
        edges = record.edges.len(),
        partial = record.failure.is_some(),
        "Extracted file"
    );
    Ok(record)
}

/// Run a query over the tree, returning whether the match limit was exceeded
fn run_query<'tree, F>(
    query: &Query,
    root: Node<'tree>,
    source: &str,
    options: &ExtractionOptions,
    mut on_match: F,
) -> bool
where
    F: FnMut(&QueryMatch<'_, 'tree>),
{
    let mut cursor = QueryCursor::new();
    cursor.set_match_limit(options.query_match_limit);
    cursor.set_timeout_micros(options.parse_timeout_ms.saturating_mul(1_000));
    {
        let mut matches = cursor.matches(query, root, source.as_bytes());
        while let Some(query_match) = matches.next() {
            on_match(query_match);
        }
    }
    cursor.did_exceed_match_limit()
}

fn read_definition<'tree>(
    adapter: GrammarAdapter,
    query_match: &QueryMatch<'_, 'tree>,
    query: &Query,
    source: &str,
) -> Option<Definition<'tree>> {
    let name_node = find_capture_node(query_match, query, "name")?;
    let name = text_or_empty(name_node, source).to_string();
    if name.is_empty() {
        return None;
    }

    if let Some(scope) = find_capture_node(query_match, query, "scope") {
        return Some(Definition {
            node: scope,
            name,
            kind: None,
        });
    }

    let (suffix, node) = find_prefixed_capture(query_match, query, "definition.")?;
    let kind = match suffix {
        "module" => SymbolKind::Module,
        "type" => SymbolKind::Type,
        "interface" => SymbolKind::Interface,
        "function" => SymbolKind::Function,
        "method" => SymbolKind::Method,
        "field" => SymbolKind::Field,
        _ => return None,
    };
    Some(Definition {
        node,
        name,
        kind: Some(adapter.refine_kind(kind, node, source)),
    })
}

/// Definitions and scopes enclosing `node`, outermost first
fn enclosing_definitions<'a, 'tree>(
    node: Node<'tree>,
    definitions: &'a [Definition<'tree>],
    scopes: &HashMap<usize, usize>,
) -> Vec<&'a Definition<'tree>> {
    let mut chain = Vec::new();
    let mut current = node.parent();
    while let Some(ancestor) = current {
        if let Some(&index) = scopes.get(&ancestor.id()) {
            chain.push(&definitions[index]);
        }
        current = ancestor.parent();
    }
    chain.reverse();
    chain
}

fn module_symbol(
    adapter: GrammarAdapter,
    file_path: &str,
    module_path: Option<&str>,
    root: Node,
    source: &str,
) -> SymbolNode {
    let language = adapter.language();
    let stem = std::path::Path::new(file_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_path)
        .to_string();
    let qualified_name = module_path.map(str::to_string).unwrap_or_else(|| stem.clone());
    let name = qualified_name
        .rsplit(language.separator())
        .next()
        .unwrap_or(&stem)
        .to_string();

    SymbolNode::new(
        SymbolKind::Module,
        name,
        qualified_name,
        file_path,
        SourceSpan::from_tree_sitter_node(root),
        language,
    )
    .with_docstring(adapter.module_docstring(root, source))
    .with_body_fingerprint(content_fingerprint(source.as_bytes()))
}

/// Resolve edge sites against the file's own symbols
///
/// Every kind-compatible same-name symbol becomes a separate edge, ordered
/// by the tie-break and distinguished by ordinal.
fn resolve_in_file(
    sites: &[EdgeSite],
    nodes: &[SymbolNode],
    file_path: &str,
    options: &ExtractionOptions,
) -> Vec<Edge> {
    let mut by_name: HashMap<&str, Vec<&SymbolNode>> = HashMap::new();
    for node in nodes {
        by_name.entry(node.name.as_str()).or_default().push(node);
    }

    let mut edges = Vec::with_capacity(sites.len());
    for site in sites {
        let mut candidates: Vec<SymbolNode> = if site.kind == EdgeKind::Imports {
            Vec::new()
        } else {
            by_name
                .get(site.target_name.as_str())
                .map(|matches| {
                    matches
                        .iter()
                        .filter(|n| site.kind.accepts_target(n.kind))
                        .filter(|n| !(site.kind.is_hierarchy() && n.id == site.source))
                        .map(|n| (*n).clone())
                        .collect()
                })
                .unwrap_or_default()
        };

        if candidates.is_empty() {
            edges.push(Edge::new(
                site.kind,
                site.source.clone(),
                site.target_name.clone(),
                file_path,
                site.site,
            ));
            continue;
        }

        rank_candidates(
            &mut candidates,
            &site.target_name,
            Some(file_path),
            options.tie_break,
        );
        candidates.truncate(options.max_candidates.max(1));
        for (ordinal, candidate) in candidates.into_iter().enumerate() {
            edges.push(
                Edge::with_ordinal(
                    site.kind,
                    site.source.clone(),
                    site.target_name.clone(),
                    file_path,
                    site.site,
                    ordinal as u32,
                )
                .resolved_to(candidate.id),
            );
        }
    }
    edges
}

/// Methods of a subtype that redefine a same-named method of a same-file supertype
fn derive_overrides(
    edges: &[Edge],
    nodes: &[SymbolNode],
    file_path: &str,
    separator: &str,
) -> Vec<Edge> {
    let by_id: HashMap<&NodeId, &SymbolNode> = nodes.iter().map(|n| (&n.id, n)).collect();
    let methods: HashMap<&str, &SymbolNode> = nodes
        .iter()
        .filter(|n| n.kind == SymbolKind::Method)
        .map(|n| (n.qualified_name.as_str(), n))
        .collect();

    let mut overrides = Vec::new();
    let mut per_method: HashMap<NodeId, u32> = HashMap::new();

    for edge in edges.iter().filter(|e| e.kind.is_hierarchy()) {
        let (Some(sub), Some(sup)) = (
            by_id.get(&edge.source),
            edge.target_id().and_then(|id| by_id.get(id)),
        ) else {
            continue;
        };
        if !sub.kind.is_type_like() {
            continue;
        }
        let prefix = format!("{}{}", sub.qualified_name, separator);
        for method in nodes.iter().filter(|n| {
            n.kind == SymbolKind::Method
                && n.qualified_name.strip_prefix(&prefix) == Some(n.name.as_str())
        }) {
            let base_name = format!("{}{}{}", sup.qualified_name, separator, method.name);
            let Some(base) = methods.get(base_name.as_str()) else {
                continue;
            };
            let ordinal = per_method.entry(method.id.clone()).or_insert(0);
            overrides.push(
                Edge::with_ordinal(
                    EdgeKind::Overrides,
                    method.id.clone(),
                    method.name.clone(),
                    file_path,
                    method.span,
                    *ordinal,
                )
                .resolved_to(base.id.clone()),
            );
            *ordinal += 1;
        }
    }
    overrides
}
