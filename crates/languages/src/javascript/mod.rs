//! JavaScript grammar rules, shared with TypeScript
//!
//! Signatures handle both plain JavaScript parameters and TypeScript's
//! `required_parameter`/`optional_parameter` nodes, since TypeScript's
//! grammar extends JavaScript's.

pub(crate) mod queries;

use crate::common::{preceding_comments, strip_annotation_colon, strip_block_comment, text_or_empty};
use codegraph_core::signature::SignatureShape;
use tree_sitter::Node;

/// Function node carrying the parameters for a definition
///
/// For `const f = (a) => ...` the definition is the declarator and the
/// parameters live on its value.
fn function_node(node: Node) -> Node {
    if node.kind() == "variable_declarator" {
        node.child_by_field_name("value").unwrap_or(node)
    } else {
        node
    }
}

/// `name(p: T, ...) -> R`; parameters are untyped in plain JavaScript
pub(crate) fn signature(node: Node, name: &str, source: &str) -> Option<String> {
    let func = function_node(node);

    // Single bare parameter arrow functions: `x => x + 1`
    if let Some(param) = func.child_by_field_name("parameter") {
        let params = vec![(text_or_empty(param, source).to_string(), None)];
        return Some(SignatureShape::render(name, &params, None));
    }

    let params_node = func.child_by_field_name("parameters")?;
    let mut cursor = params_node.walk();
    let params: Vec<(String, Option<String>)> = params_node
        .named_children(&mut cursor)
        .filter_map(|param| match param.kind() {
            "identifier" | "rest_pattern" | "object_pattern" | "array_pattern" => {
                Some((text_or_empty(param, source).to_string(), None))
            }
            "assignment_pattern" => {
                let left = param.child_by_field_name("left")?;
                Some((text_or_empty(left, source).to_string(), None))
            }
            "required_parameter" | "optional_parameter" => {
                let pattern = param.child_by_field_name("pattern")?;
                let ty = param
                    .child_by_field_name("type")
                    .map(|t| strip_annotation_colon(text_or_empty(t, source)).to_string());
                Some((text_or_empty(pattern, source).to_string(), ty))
            }
            _ => None,
        })
        .collect();

    let return_type = func
        .child_by_field_name("return_type")
        .map(|r| strip_annotation_colon(text_or_empty(r, source)));
    Some(SignatureShape::render(name, &params, return_type))
}

/// JSDoc block directly above a declaration (or its `export`/`const` wrapper)
pub(crate) fn docstring(node: Node, source: &str) -> Option<String> {
    let mut anchor = node;
    if anchor.kind() == "variable_declarator" {
        if let Some(parent) = anchor.parent() {
            anchor = parent;
        }
    }
    if let Some(parent) = anchor.parent() {
        if parent.kind() == "export_statement" {
            anchor = parent;
        }
    }
    preceding_comments(
        anchor,
        source,
        &["comment"],
        &["decorator"],
        |text| text.starts_with("/**"),
        strip_block_comment,
    )
}

/// Leading JSDoc block of the file, when it is not attached to a declaration
pub(crate) fn module_docstring(root: Node, source: &str) -> Option<String> {
    let first = root.named_child(0)?;
    if first.kind() != "comment" {
        return None;
    }
    let text = text_or_empty(first, source);
    if !text.starts_with("/**") {
        return None;
    }
    // A comment immediately followed by a declaration documents that declaration
    if let Some(next) = first.next_named_sibling() {
        if next.kind() != "comment" && next.start_position().row <= first.end_position().row + 1 {
            return None;
        }
    }
    let doc = strip_block_comment(text);
    (!doc.is_empty()).then_some(doc)
}
