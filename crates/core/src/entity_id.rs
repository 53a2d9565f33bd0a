//! Identity generation utilities for unique, deterministic IDs

use crate::entities::{EdgeId, EdgeKind, Language, NodeId, SourceSpan, SymbolKind};
use twox_hash::XxHash3_128;

/// Context for tracking scope during AST traversal
#[derive(Debug, Clone)]
pub struct ScopeContext {
    /// Stack of scope names from root to current position
    pub scope_stack: Vec<String>,
    separator: &'static str,
}

impl ScopeContext {
    /// Create a root scope context, optionally seeded with a module path
    pub fn new(module_path: Option<&str>, separator: &'static str) -> Self {
        let scope_stack = module_path
            .filter(|m| !m.is_empty())
            .map(|m| vec![m.to_string()])
            .unwrap_or_default();
        Self {
            scope_stack,
            separator,
        }
    }

    /// Push a new named scope onto the stack
    pub fn push_scope(&mut self, name: impl Into<String>) {
        self.scope_stack.push(name.into());
    }

    /// Pop the current scope from the stack
    pub fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    /// Build a fully qualified name from the current scope
    pub fn build_qualified_name(&self, name: &str) -> String {
        if self.scope_stack.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", self.scope_stack.join(self.separator), self.separator, name)
        }
    }

    /// Get the current scope path as a string
    pub fn current_scope_path(&self) -> String {
        self.scope_stack.join(self.separator)
    }
}

/// Generate the identity of a symbol from its qualified name, kind and declaring file
pub fn generate_node_id(qualified_name: &str, kind: SymbolKind, file_path: &str) -> NodeId {
    let unique_str = format!("{qualified_name}|{kind}|{file_path}");
    NodeId::new(format!(
        "sym-{:032x}",
        XxHash3_128::oneshot(unique_str.as_bytes())
    ))
}

/// Generate the identity of an edge from its source, kind, target name, site and ordinal
pub fn generate_edge_id(
    source: &NodeId,
    kind: EdgeKind,
    target_name: &str,
    site: &SourceSpan,
    ordinal: u32,
) -> EdgeId {
    let unique_str = format!(
        "{source}|{kind}|{target_name}|L{}:C{}|{ordinal}",
        site.start_line, site.start_column
    );
    EdgeId::new(format!(
        "edge-{:032x}",
        XxHash3_128::oneshot(unique_str.as_bytes())
    ))
}

/// Content fingerprint used to detect changed files and symbol bodies
pub fn content_fingerprint(content: &[u8]) -> String {
    format!("{:032x}", XxHash3_128::oneshot(content))
}

/// Derive a module path from a workspace-relative file path
///
/// `src/billing/invoice.rs` becomes `billing::invoice` for Rust and
/// `pkg/__init__.py` becomes `pkg` for Python. Returns `None` for files
/// that map to the workspace root module (`src/lib.rs`, `index.js`).
pub fn derive_module_path(file_path: &str, language: Language) -> Option<String> {
    let mut segments: Vec<&str> = file_path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    let file_name = segments.pop()?;
    let stem = file_name.split('.').next().unwrap_or(file_name);

    if segments.first() == Some(&"src") {
        segments.remove(0);
    }

    let drop_stem = matches!(stem, "lib" | "mod" | "main" | "__init__" | "index");
    if !drop_stem && !stem.is_empty() {
        segments.push(stem);
    }

    if segments.is_empty() {
        return None;
    }

    let module: Vec<String> = segments.iter().map(|s| s.replace('-', "_")).collect();
    Some(module.join(language.separator()))
}
