//! Go grammar rules: receivers, interface methods, signatures and comments

pub(crate) mod queries;

use crate::common::{preceding_comments, text_or_empty};
use codegraph_core::entities::SymbolKind;
use codegraph_core::signature::SignatureShape;
use tree_sitter::Node;

pub(crate) const BUILTIN_TYPES: &[&str] = &[
    "bool", "string", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr", "byte", "rune", "float32", "float64", "complex64",
    "complex128", "error", "any",
];

/// `name(p T, ...) -> R` rendered as `name(p: T) -> R`; the receiver is omitted
pub(crate) fn signature(node: Node, name: &str, source: &str) -> Option<String> {
    let params_node = node.child_by_field_name("parameters")?;
    let mut cursor = params_node.walk();
    let mut params: Vec<(String, Option<String>)> = Vec::new();

    for decl in params_node.named_children(&mut cursor) {
        let ty = decl
            .child_by_field_name("type")
            .map(|t| text_or_empty(t, source).to_string());
        match decl.kind() {
            "parameter_declaration" => {
                let mut names_cursor = decl.walk();
                let names: Vec<String> = decl
                    .children_by_field_name("name", &mut names_cursor)
                    .map(|n| text_or_empty(n, source).to_string())
                    .collect();
                if names.is_empty() {
                    params.push(("_".to_string(), ty));
                } else {
                    params.extend(names.into_iter().map(|n| (n, ty.clone())));
                }
            }
            "variadic_parameter_declaration" => {
                let name = decl
                    .child_by_field_name("name")
                    .map(|n| text_or_empty(n, source).to_string())
                    .unwrap_or_else(|| "_".to_string());
                params.push((name, ty.map(|t| format!("...{t}"))));
            }
            _ => {}
        }
    }

    let result = node
        .child_by_field_name("result")
        .map(|r| text_or_empty(r, source));
    Some(SignatureShape::render(name, &params, result))
}

/// `//` comment block directly above a declaration
pub(crate) fn docstring(node: Node, source: &str) -> Option<String> {
    // `type Foo struct` is a type_spec inside a type_declaration; the comment
    // sits above the declaration.
    let anchor = match node.parent() {
        Some(parent) if node.kind() == "type_spec" && parent.kind() == "type_declaration" => parent,
        _ => node,
    };
    preceding_comments(
        anchor,
        source,
        &["comment"],
        &[],
        |text| text.starts_with("//"),
        |text| text.trim_start_matches("//").trim().to_string(),
    )
}

/// Package comment above the `package` clause
pub(crate) fn module_docstring(root: Node, source: &str) -> Option<String> {
    let mut cursor = root.walk();
    let package = root
        .named_children(&mut cursor)
        .find(|child| child.kind() == "package_clause")?;
    docstring(package, source)
}

/// Receiver type name of a method declaration (`func (s *Store) Get()` → `Store`)
pub(crate) fn receiver_type(node: Node, source: &str) -> Option<String> {
    if node.kind() != "method_declaration" {
        return None;
    }
    let receiver = node.child_by_field_name("receiver")?;
    find_type_identifier(receiver).map(|t| text_or_empty(t, source).to_string())
}

/// `type X interface { ... }` is an interface
pub(crate) fn refine_kind(kind: SymbolKind, node: Node) -> SymbolKind {
    let is_interface = node.kind() == "type_spec"
        && node
            .child_by_field_name("type")
            .is_some_and(|t| t.kind() == "interface_type");
    if is_interface {
        SymbolKind::Interface
    } else {
        kind
    }
}

/// Method elements declared in an interface body
pub(crate) fn interface_methods<'tree>(
    node: Node<'tree>,
    source: &str,
) -> Vec<(Node<'tree>, String)> {
    let Some(body) = node
        .child_by_field_name("type")
        .filter(|t| t.kind() == "interface_type")
    else {
        return Vec::new();
    };
    let mut cursor = body.walk();
    body.named_children(&mut cursor)
        .filter(|child| matches!(child.kind(), "method_elem" | "method_spec"))
        .filter_map(|child| {
            let name = child.child_by_field_name("name")?;
            Some((child, text_or_empty(name, source).to_string()))
        })
        .collect()
}

fn find_type_identifier(node: Node) -> Option<Node> {
    if node.kind() == "type_identifier" {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    children.into_iter().find_map(find_type_identifier)
}
