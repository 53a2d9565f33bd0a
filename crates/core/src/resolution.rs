//! Candidate ordering for name-based resolution
//!
//! When several symbols share a name, edge resolution records all of them
//! and `goto` returns all of them. The tie-break decides their order; it is
//! a heuristic, not a correctness property, and is configurable.

use crate::entities::SymbolNode;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum_macros::{Display, EnumString};

/// Ordering heuristic among same-named candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TieBreak {
    /// Fewest characters in the qualified name first
    #[default]
    ShortestQualifiedName,
    /// Longest shared directory prefix with the referencing file first
    NearestPath,
    /// Plain lexicographic order of qualified name
    Lexicographic,
}

/// Sort candidates best-first
///
/// Exact qualified-name matches with `query` always come first. `from_file`
/// is the referencing file, used by [`TieBreak::NearestPath`].
pub fn rank_candidates(
    candidates: &mut [SymbolNode],
    query: &str,
    from_file: Option<&str>,
    tie_break: TieBreak,
) {
    candidates.sort_by(|a, b| compare_candidates(a, b, query, from_file, tie_break));
}

fn compare_candidates(
    a: &SymbolNode,
    b: &SymbolNode,
    query: &str,
    from_file: Option<&str>,
    tie_break: TieBreak,
) -> Ordering {
    let exact = |n: &SymbolNode| n.qualified_name != query;
    exact(a)
        .cmp(&exact(b))
        .then_with(|| match tie_break {
            TieBreak::ShortestQualifiedName => a.qualified_name.len().cmp(&b.qualified_name.len()),
            TieBreak::NearestPath => {
                let from = from_file.unwrap_or_default();
                shared_dir_depth(&b.file, from)
                    .cmp(&shared_dir_depth(&a.file, from))
                    .then_with(|| a.qualified_name.len().cmp(&b.qualified_name.len()))
            }
            TieBreak::Lexicographic => Ordering::Equal,
        })
        .then_with(|| a.qualified_name.cmp(&b.qualified_name))
        .then_with(|| a.file.cmp(&b.file))
        .then_with(|| a.span.start_line.cmp(&b.span.start_line))
}

fn shared_dir_depth(a: &str, b: &str) -> usize {
    let dirs = |p: &str| {
        let mut parts: Vec<String> = p.split('/').map(str::to_string).collect();
        parts.pop();
        parts
    };
    dirs(a)
        .iter()
        .zip(dirs(b).iter())
        .take_while(|(x, y)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Language, SourceSpan, SymbolKind};

    fn node(qname: &str, file: &str) -> SymbolNode {
        let name = qname.rsplit('.').next().unwrap_or(qname);
        SymbolNode::new(
            SymbolKind::Function,
            name,
            qname,
            file,
            SourceSpan::lines(1, 2),
            Language::Python,
        )
    }

    fn order(nodes: &[SymbolNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.qualified_name.as_str()).collect()
    }

    #[test]
    fn test_exact_qualified_match_wins() {
        let mut nodes = vec![node("a.run", "a.py"), node("pkg.deep.mod.run", "pkg/deep/mod.py")];
        rank_candidates(&mut nodes, "pkg.deep.mod.run", None, TieBreak::ShortestQualifiedName);
        assert_eq!(order(&nodes), vec!["pkg.deep.mod.run", "a.run"]);
    }

    #[test]
    fn test_shortest_qualified_name() {
        let mut nodes = vec![node("pkg.util.run", "pkg/util.py"), node("a.run", "a.py")];
        rank_candidates(&mut nodes, "run", None, TieBreak::ShortestQualifiedName);
        assert_eq!(order(&nodes), vec!["a.run", "pkg.util.run"]);
    }

    #[test]
    fn test_nearest_path() {
        let mut nodes = vec![node("a.run", "a.py"), node("svc.api.util.run", "svc/api/util.py")];
        rank_candidates(&mut nodes, "run", Some("svc/api/handler.py"), TieBreak::NearestPath);
        assert_eq!(order(&nodes), vec!["svc.api.util.run", "a.run"]);
    }

    #[test]
    fn test_lexicographic() {
        let mut nodes = vec![node("zeta.run", "z.py"), node("alpha.beta.run", "a.py")];
        rank_candidates(&mut nodes, "run", None, TieBreak::Lexicographic);
        assert_eq!(order(&nodes), vec!["alpha.beta.run", "zeta.run"]);
    }
}
