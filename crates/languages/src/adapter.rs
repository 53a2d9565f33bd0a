//! Grammar adapters: the closed set of tree-sitter backed languages
//!
//! Each variant supplies its tree-sitter grammar, the queries that locate
//! definitions and edge sites, and the small amount of per-grammar logic
//! (signatures, doc comments, kind refinement) that queries cannot express.
//! Supporting a new language means adding a variant here.

use crate::{go, javascript, python, rust, typescript};
use codegraph_core::entities::{Language, SymbolKind};
use tree_sitter::Node;

/// One family of queries an adapter provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Definitions,
    Calls,
    Relations,
    Imports,
    TypeRefs,
}

impl QueryKind {
    pub const ALL: [QueryKind; 5] = [
        QueryKind::Definitions,
        QueryKind::Calls,
        QueryKind::Relations,
        QueryKind::Imports,
        QueryKind::TypeRefs,
    ];
}

/// A language with a full tree-sitter extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarAdapter {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
}

impl GrammarAdapter {
    pub const ALL: [GrammarAdapter; 6] = [
        GrammarAdapter::Rust,
        GrammarAdapter::Python,
        GrammarAdapter::JavaScript,
        GrammarAdapter::TypeScript,
        GrammarAdapter::Tsx,
        GrammarAdapter::Go,
    ];

    /// Adapter for a language tag, `None` for languages without a grammar
    pub fn for_language(language: Language) -> Option<Self> {
        match language {
            Language::Rust => Some(Self::Rust),
            Language::Python => Some(Self::Python),
            Language::JavaScript => Some(Self::JavaScript),
            Language::TypeScript => Some(Self::TypeScript),
            Language::Tsx => Some(Self::Tsx),
            Language::Go => Some(Self::Go),
            _ => None,
        }
    }

    pub fn language(self) -> Language {
        match self {
            Self::Rust => Language::Rust,
            Self::Python => Language::Python,
            Self::JavaScript => Language::JavaScript,
            Self::TypeScript => Language::TypeScript,
            Self::Tsx => Language::Tsx,
            Self::Go => Language::Go,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }

    /// Query source for one query family, `None` when the grammar has nothing to match
    pub fn query_source(self, kind: QueryKind) -> Option<&'static str> {
        let source = match (self, kind) {
            (Self::Rust, QueryKind::Definitions) => rust::queries::DEFINITIONS,
            (Self::Rust, QueryKind::Calls) => rust::queries::CALLS,
            (Self::Rust, QueryKind::Relations) => rust::queries::RELATIONS,
            (Self::Rust, QueryKind::Imports) => rust::queries::IMPORTS,
            (Self::Rust, QueryKind::TypeRefs) => rust::queries::TYPE_REFS,

            (Self::Python, QueryKind::Definitions) => python::queries::DEFINITIONS,
            (Self::Python, QueryKind::Calls) => python::queries::CALLS,
            (Self::Python, QueryKind::Relations) => python::queries::RELATIONS,
            (Self::Python, QueryKind::Imports) => python::queries::IMPORTS,
            (Self::Python, QueryKind::TypeRefs) => python::queries::TYPE_REFS,

            (Self::JavaScript, QueryKind::Definitions) => javascript::queries::DEFINITIONS,
            (Self::JavaScript, QueryKind::Calls) => javascript::queries::CALLS,
            (Self::JavaScript, QueryKind::Relations) => javascript::queries::RELATIONS,
            (Self::JavaScript, QueryKind::Imports) => javascript::queries::IMPORTS,
            (Self::JavaScript, QueryKind::TypeRefs) => return None,

            (Self::TypeScript | Self::Tsx, QueryKind::Definitions) => {
                typescript::queries::DEFINITIONS
            }
            (Self::TypeScript | Self::Tsx, QueryKind::Calls) => typescript::queries::CALLS,
            (Self::TypeScript | Self::Tsx, QueryKind::Relations) => typescript::queries::RELATIONS,
            (Self::TypeScript | Self::Tsx, QueryKind::Imports) => typescript::queries::IMPORTS,
            (Self::TypeScript | Self::Tsx, QueryKind::TypeRefs) => typescript::queries::TYPE_REFS,

            (Self::Go, QueryKind::Definitions) => go::queries::DEFINITIONS,
            (Self::Go, QueryKind::Calls) => go::queries::CALLS,
            (Self::Go, QueryKind::Relations) => go::queries::RELATIONS,
            (Self::Go, QueryKind::Imports) => go::queries::IMPORTS,
            (Self::Go, QueryKind::TypeRefs) => go::queries::TYPE_REFS,
        };
        Some(source)
    }

    /// Normalized signature for a callable definition
    pub(crate) fn signature(
        self,
        node: Node,
        name: &str,
        kind: SymbolKind,
        source: &str,
    ) -> Option<String> {
        match self {
            Self::Rust => rust::signature(node, name, source),
            Self::Python => python::signature(node, name, kind, source),
            Self::JavaScript | Self::TypeScript | Self::Tsx => {
                javascript::signature(node, name, source)
            }
            Self::Go => go::signature(node, name, source),
        }
    }

    pub(crate) fn docstring(self, node: Node, source: &str) -> Option<String> {
        match self {
            Self::Rust => rust::docstring(node, source),
            Self::Python => python::docstring(node, source),
            Self::JavaScript | Self::TypeScript | Self::Tsx => javascript::docstring(node, source),
            Self::Go => go::docstring(node, source),
        }
    }

    pub(crate) fn module_docstring(self, root: Node, source: &str) -> Option<String> {
        match self {
            Self::Rust => rust::module_docstring(root, source),
            Self::Python => python::module_docstring(root, source),
            Self::JavaScript | Self::TypeScript | Self::Tsx => {
                javascript::module_docstring(root, source)
            }
            Self::Go => go::module_docstring(root, source),
        }
    }

    /// Adjust the kind a query assigned, using the definition's syntax
    pub(crate) fn refine_kind(self, kind: SymbolKind, node: Node, source: &str) -> SymbolKind {
        match self {
            Self::Python => python::refine_kind(kind, node, source),
            Self::Go => go::refine_kind(kind, node),
            _ => kind,
        }
    }

    /// Scope a definition belongs to that is not a syntactic ancestor (Go receivers)
    pub(crate) fn detached_scope(self, node: Node, source: &str) -> Option<String> {
        match self {
            Self::Go => go::receiver_type(node, source),
            _ => None,
        }
    }

    /// Definitions the queries cannot reach, nested under `node`
    pub(crate) fn nested_definitions<'tree>(
        self,
        node: Node<'tree>,
        source: &str,
    ) -> Vec<(Node<'tree>, String, SymbolKind)> {
        match self {
            Self::Go => go::interface_methods(node, source)
                .into_iter()
                .map(|(n, name)| (n, name, SymbolKind::Method))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Builtin type names never worth an edge
    pub(crate) fn is_builtin_type(self, name: &str) -> bool {
        let builtins: &[&str] = match self {
            Self::Rust => rust::BUILTIN_TYPES,
            Self::Python => python::BUILTIN_TYPES,
            Self::JavaScript => &[],
            Self::TypeScript | Self::Tsx => typescript::BUILTIN_TYPES,
            Self::Go => go::BUILTIN_TYPES,
        };
        builtins.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Query;

    #[test]
    fn test_every_query_compiles() {
        for adapter in GrammarAdapter::ALL {
            let language = adapter.tree_sitter_language();
            for kind in QueryKind::ALL {
                if let Some(source) = adapter.query_source(kind) {
                    let compiled = Query::new(&language, source);
                    assert!(
                        compiled.is_ok(),
                        "{adapter:?} {kind:?} query failed to compile: {:?}",
                        compiled.err()
                    );
                }
            }
        }
    }

    #[test]
    fn test_for_language_round_trips() {
        for adapter in GrammarAdapter::ALL {
            assert_eq!(GrammarAdapter::for_language(adapter.language()), Some(adapter));
        }
        assert_eq!(GrammarAdapter::for_language(Language::Java), None);
    }
}
