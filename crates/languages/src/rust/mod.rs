//! Rust grammar rules: signatures, doc comments and builtin types

pub(crate) mod queries;

use crate::common::{preceding_comments, strip_block_comment, text_or_empty};
use codegraph_core::signature::SignatureShape;
use tree_sitter::Node;

pub(crate) const BUILTIN_TYPES: &[&str] = &[
    "bool", "char", "str", "String", "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16",
    "i32", "i64", "i128", "isize", "f32", "f64", "Self", "Option", "Result", "Vec", "Box", "Rc",
    "Arc", "HashMap", "HashSet", "BTreeMap", "BTreeSet",
];

/// `name(p: T, ...) -> R` for `fn` items and trait method signatures
pub(crate) fn signature(node: Node, name: &str, source: &str) -> Option<String> {
    let params_node = node.child_by_field_name("parameters")?;
    let mut cursor = params_node.walk();
    let params: Vec<(String, Option<String>)> = params_node
        .named_children(&mut cursor)
        .filter_map(|param| match param.kind() {
            "parameter" => {
                let pattern = param.child_by_field_name("pattern")?;
                let ty = param
                    .child_by_field_name("type")
                    .map(|t| text_or_empty(t, source).to_string());
                Some((text_or_empty(pattern, source).to_string(), ty))
            }
            "variadic_parameter" => Some(("...".to_string(), None)),
            _ => None,
        })
        .collect();
    let return_type = node
        .child_by_field_name("return_type")
        .map(|r| text_or_empty(r, source));
    Some(SignatureShape::render(name, &params, return_type))
}

/// Outer doc comments (`///` or `/** */`) directly above an item
pub(crate) fn docstring(node: Node, source: &str) -> Option<String> {
    preceding_comments(
        node,
        source,
        &["line_comment", "block_comment"],
        &["attribute_item"],
        |text| text.starts_with("///") || text.starts_with("/**"),
        strip_doc_comment,
    )
}

/// Inner doc comments (`//!`) at the top of the file
pub(crate) fn module_docstring(root: Node, source: &str) -> Option<String> {
    let mut cursor = root.walk();
    let lines: Vec<String> = root
        .children(&mut cursor)
        .take_while(|child| child.kind() == "line_comment")
        .map(|child| text_or_empty(child, source))
        .filter(|text| text.starts_with("//!"))
        .map(|text| text.trim_start_matches("//!").trim().to_string())
        .collect();
    let doc = lines.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

fn strip_doc_comment(text: &str) -> String {
    if text.starts_with("/**") {
        strip_block_comment(text)
    } else {
        text.trim_start_matches("///").trim().to_string()
    }
}
