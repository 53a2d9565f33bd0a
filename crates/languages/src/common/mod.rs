//! Language-agnostic utilities for extraction
//!
//! These utilities work across all languages using tree-sitter.

use tree_sitter::{Node, Query, QueryMatch};

/// Find a capture node by name in a query match
pub fn find_capture_node<'tree>(
    query_match: &QueryMatch<'_, 'tree>,
    query: &Query,
    name: &str,
) -> Option<Node<'tree>> {
    query_match.captures.iter().find_map(|capture| {
        let capture_name = query.capture_names().get(capture.index as usize)?;
        if *capture_name == name {
            Some(capture.node)
        } else {
            None
        }
    })
}

/// All nodes captured under `name` in a query match
pub fn find_capture_nodes<'tree>(
    query_match: &QueryMatch<'_, 'tree>,
    query: &Query,
    name: &str,
) -> Vec<Node<'tree>> {
    query_match
        .captures
        .iter()
        .filter(|capture| {
            query
                .capture_names()
                .get(capture.index as usize)
                .is_some_and(|n| *n == name)
        })
        .map(|capture| capture.node)
        .collect()
}

/// Find the first capture whose name starts with `prefix`, returning the suffix
pub fn find_prefixed_capture<'tree, 'q>(
    query_match: &QueryMatch<'_, 'tree>,
    query: &'q Query,
    prefix: &str,
) -> Option<(&'q str, Node<'tree>)> {
    query_match.captures.iter().find_map(|capture| {
        let capture_name: &'q str = *query.capture_names().get(capture.index as usize)?;
        capture_name
            .strip_prefix(prefix)
            .map(|suffix| (suffix, capture.node))
    })
}

/// Node text, or an empty string for nodes that do not slice cleanly
pub fn text_or_empty<'s>(node: Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

/// Last segment of a path written with `::`, `.` or `/`
pub fn last_path_segment(path: &str) -> &str {
    let trimmed = path.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '`');
    trimmed
        .rsplit(|c: char| c == ':' || c == '.' || c == '/')
        .find(|s| !s.is_empty())
        .unwrap_or(trimmed)
}

/// Strip a leading `:` from a type annotation node text (`: number` → `number`)
pub fn strip_annotation_colon(text: &str) -> &str {
    text.trim().trim_start_matches(':').trim()
}

/// Collect the comment block directly above `node`
///
/// Only comments accepted by `is_doc` are collected, and attribute or
/// decorator siblings are skipped over. Each comment is passed through
/// `strip` before the lines are joined.
pub fn preceding_comments(
    node: Node,
    source: &str,
    comment_kinds: &[&str],
    skip_kinds: &[&str],
    is_doc: impl Fn(&str) -> bool,
    strip: impl Fn(&str) -> String,
) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = node.prev_sibling();
    let mut expected_row = node.start_position().row;

    while let Some(sibling) = current {
        let kind = sibling.kind();
        if skip_kinds.contains(&kind) {
            expected_row = sibling.start_position().row;
            current = sibling.prev_sibling();
            continue;
        }
        if !comment_kinds.contains(&kind) {
            break;
        }
        // A blank line between comment and declaration detaches the comment
        if sibling.end_position().row + 1 < expected_row {
            break;
        }
        let text = text_or_empty(sibling, source);
        if !is_doc(text) {
            break;
        }
        lines.push(strip(text));
        expected_row = sibling.start_position().row;
        current = sibling.prev_sibling();
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let doc = lines.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

/// Strip `/** ... */` or `/* ... */` delimiters and leading `*` from a block comment
pub fn strip_block_comment(text: &str) -> String {
    let inner = text
        .trim()
        .trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_end_matches("*/");
    inner
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 1-based line of the first error or missing node in the tree
pub fn first_error_line(root: Node) -> Option<usize> {
    let mut cursor = root.walk();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        if node.has_error() {
            let children: Vec<Node> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_path_segment() {
        assert_eq!(last_path_segment("crate::billing::Invoice"), "Invoice");
        assert_eq!(last_path_segment("os.path"), "path");
        assert_eq!(last_path_segment("\"github.com/acme/store\""), "store");
        assert_eq!(last_path_segment("plain"), "plain");
    }

    #[test]
    fn test_strip_block_comment() {
        let doc = strip_block_comment("/**\n * Adds two numbers.\n * Returns the sum.\n */");
        assert_eq!(doc, "Adds two numbers.\nReturns the sum.");
    }

    #[test]
    fn test_strip_annotation_colon() {
        assert_eq!(strip_annotation_colon(": number"), "number");
        assert_eq!(strip_annotation_colon("string"), "string");
    }
}
