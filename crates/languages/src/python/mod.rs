//! Python grammar rules: signatures, docstrings and protocol detection

pub(crate) mod queries;

use crate::common::text_or_empty;
use codegraph_core::entities::SymbolKind;
use codegraph_core::signature::SignatureShape;
use tree_sitter::Node;

pub(crate) const BUILTIN_TYPES: &[&str] = &[
    "int", "str", "float", "bool", "bytes", "complex", "list", "dict", "set", "frozenset",
    "tuple", "object", "type", "None", "Any", "Optional", "List", "Dict", "Set", "Tuple", "Union",
    "Callable", "Iterable", "Iterator", "Sequence", "Mapping", "Self",
];

/// Base classes that mark a class as an interface
const INTERFACE_BASES: &[&str] = &["Protocol", "ABC"];

/// `name(p: T, ...) -> R`, without `self`/`cls` on methods
pub(crate) fn signature(node: Node, name: &str, kind: SymbolKind, source: &str) -> Option<String> {
    let params_node = node.child_by_field_name("parameters")?;
    let mut cursor = params_node.walk();
    let mut params: Vec<(String, Option<String>)> = params_node
        .named_children(&mut cursor)
        .filter_map(|param| {
            let type_text = || {
                param
                    .child_by_field_name("type")
                    .map(|t| text_or_empty(t, source).to_string())
            };
            match param.kind() {
                "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                    Some((text_or_empty(param, source).to_string(), None))
                }
                "typed_parameter" => {
                    let name = param.named_child(0)?;
                    Some((text_or_empty(name, source).to_string(), type_text()))
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = param.child_by_field_name("name")?;
                    Some((text_or_empty(name, source).to_string(), type_text()))
                }
                _ => None,
            }
        })
        .collect();

    if kind == SymbolKind::Method
        && params
            .first()
            .is_some_and(|(first, _)| first == "self" || first == "cls")
    {
        params.remove(0);
    }

    let return_type = node
        .child_by_field_name("return_type")
        .map(|r| text_or_empty(r, source));
    Some(SignatureShape::render(name, &params, return_type))
}

/// First-statement string literal of a function or class body
pub(crate) fn docstring(node: Node, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    leading_string(body, source)
}

/// Module docstring: a string literal as the first statement of the file
pub(crate) fn module_docstring(root: Node, source: &str) -> Option<String> {
    leading_string(root, source)
}

/// A class deriving from `Protocol` or `ABC` is an interface
pub(crate) fn refine_kind(kind: SymbolKind, node: Node, source: &str) -> SymbolKind {
    if kind != SymbolKind::Type {
        return kind;
    }
    let Some(bases) = node.child_by_field_name("superclasses") else {
        return kind;
    };
    let mut cursor = bases.walk();
    let is_interface = bases.named_children(&mut cursor).any(|base| {
        let text = text_or_empty(base, source);
        let leaf = text.rsplit('.').next().unwrap_or(text);
        INTERFACE_BASES.contains(&leaf)
    });
    if is_interface {
        SymbolKind::Interface
    } else {
        kind
    }
}

fn leading_string(block: Node, source: &str) -> Option<String> {
    let first = block.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let literal = first.named_child(0)?;
    if literal.kind() != "string" {
        return None;
    }
    let doc = strip_string_quotes(text_or_empty(literal, source));
    (!doc.is_empty()).then_some(doc)
}

fn strip_string_quotes(text: &str) -> String {
    let text = text.trim_start_matches(['r', 'R', 'u', 'U', 'b', 'B']);
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|quote| {
            text.strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        })
        .unwrap_or(text);
    inner
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_string_quotes() {
        assert_eq!(strip_string_quotes("\"\"\"Load the file.\"\"\""), "Load the file.");
        assert_eq!(strip_string_quotes("'short'"), "short");
        assert_eq!(
            strip_string_quotes("\"\"\"\n    First line.\n    Second line.\n    \"\"\""),
            "First line.\nSecond line."
        );
    }
}
