//! Parsed signature shapes and structural signature patterns
//!
//! Signatures are stored on symbols in one normalized textual form,
//! `name(param: Type, other) -> Ret`, whatever the source language. Matching
//! happens on the parsed shape so that parameter order and arity matter
//! while whitespace and parameter names do not.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamShape {
    pub name: Option<String>,
    pub type_name: Option<String>,
}

/// Parsed form of a normalized declaration signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureShape {
    pub name: String,
    pub params: Vec<ParamShape>,
    pub return_type: Option<String>,
}

impl SignatureShape {
    /// Render the normalized signature text for a declaration
    pub fn render(name: &str, params: &[(String, Option<String>)], return_type: Option<&str>) -> String {
        let params = params
            .iter()
            .map(|(param, ty)| match ty {
                Some(ty) => format!("{}: {}", param.trim(), collapse_whitespace(ty)),
                None => param.trim().to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        match return_type.map(collapse_whitespace).filter(|r| !r.is_empty()) {
            Some(ret) => format!("{name}({params}) -> {ret}"),
            None => format!("{name}({params})"),
        }
    }

    /// Parse a normalized declaration signature
    pub fn parse(signature: &str) -> Result<Self> {
        let parts = split_signature(signature)?;
        let params = match parts.params {
            Some(list) => split_top_level(list, ',')
                .into_iter()
                .filter(|p| !p.is_empty())
                .map(|p| match split_annotation(p) {
                    Some((name, ty)) => ParamShape {
                        name: Some(name.to_string()),
                        type_name: Some(normalize_type(ty)),
                    },
                    None => ParamShape {
                        name: Some(p.to_string()),
                        type_name: None,
                    },
                })
                .collect(),
            None => Vec::new(),
        };
        Ok(Self {
            name: parts.name.to_string(),
            params,
            return_type: parts.return_type.map(normalize_type),
        })
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// One parameter slot in a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypePattern {
    /// `*`, `_` or `?`: any type, including an undeclared one
    Any,
    /// A concrete type compared after whitespace normalization
    Exact(String),
}

impl TypePattern {
    fn parse(text: &str) -> Self {
        // A pattern slot may name the parameter too; only the type is compared.
        let ty = split_annotation(text).map(|(_, ty)| ty).unwrap_or(text);
        match ty.trim() {
            "*" | "_" | "?" => Self::Any,
            other => Self::Exact(normalize_type(other)),
        }
    }

    fn matches(&self, declared: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => declared.is_some_and(|d| d == expected),
        }
    }
}

/// Structural pattern such as `process(int, String)` or `load(*, Path) -> Config`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePattern {
    pub name: String,
    /// `None` when the pattern has no parameter list and matches any arity
    pub params: Option<Vec<TypePattern>>,
    pub return_type: Option<TypePattern>,
}

impl SignaturePattern {
    /// Whether a parsed declaration satisfies this pattern
    pub fn matches(&self, shape: &SignatureShape) -> bool {
        if self.name != shape.name {
            return false;
        }
        if let Some(params) = &self.params {
            if params.len() != shape.params.len() {
                return false;
            }
            let in_order = params
                .iter()
                .zip(&shape.params)
                .all(|(pattern, param)| pattern.matches(param.type_name.as_deref()));
            if !in_order {
                return false;
            }
        }
        match &self.return_type {
            Some(pattern) => pattern.matches(shape.return_type.as_deref()),
            None => true,
        }
    }

    /// Parse the pattern and test a stored signature string against it
    pub fn matches_signature(&self, signature: &str) -> bool {
        SignatureShape::parse(signature)
            .map(|shape| self.matches(&shape))
            .unwrap_or(false)
    }
}

impl FromStr for SignaturePattern {
    type Err = Error;

    fn from_str(pattern: &str) -> Result<Self> {
        let parts = split_signature(pattern)?;
        let params = parts.params.map(|list| {
            split_top_level(list, ',')
                .into_iter()
                .filter(|p| !p.is_empty())
                .map(TypePattern::parse)
                .collect()
        });
        Ok(Self {
            name: parts.name.to_string(),
            params,
            return_type: parts.return_type.map(TypePattern::parse),
        })
    }
}

impl fmt::Display for SignaturePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = |p: &TypePattern| match p {
            TypePattern::Any => "*".to_string(),
            TypePattern::Exact(t) => t.clone(),
        };
        write!(f, "{}", self.name)?;
        if let Some(params) = &self.params {
            let list: Vec<String> = params.iter().map(slot).collect();
            write!(f, "({})", list.join(", "))?;
        }
        if let Some(ret) = &self.return_type {
            write!(f, " -> {}", slot(ret))?;
        }
        Ok(())
    }
}

struct SignatureParts<'a> {
    name: &'a str,
    params: Option<&'a str>,
    return_type: Option<&'a str>,
}

fn split_signature(text: &str) -> Result<SignatureParts<'_>> {
    let text = text.trim();
    let Some(open) = text.find('(') else {
        let (name, return_type) = match text.split_once("->") {
            Some((name, ret)) => (name.trim(), Some(ret.trim())),
            None => (text, None),
        };
        if name.is_empty() {
            return Err(Error::invalid_input(format!("signature has no name: '{text}'")));
        }
        return Ok(SignatureParts {
            name,
            params: None,
            return_type,
        });
    };

    let name = text[..open].trim();
    if name.is_empty() {
        return Err(Error::invalid_input(format!("signature has no name: '{text}'")));
    }

    let mut depth = 0usize;
    let mut close = None;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close =
        close.ok_or_else(|| Error::invalid_input(format!("unbalanced parentheses in '{text}'")))?;

    let rest = text[close + 1..].trim();
    let return_type = rest
        .strip_prefix("->")
        .or_else(|| rest.strip_prefix(':'))
        .map(str::trim)
        .filter(|r| !r.is_empty());

    Ok(SignatureParts {
        name,
        params: Some(&text[open + 1..close]),
        return_type,
    })
}

/// Split on `sep` at nesting depth zero, treating `->` as a single token
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = '\0';
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            '>' if prev == '-' => {}
            ')' | ']' | '}' | '>' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
        prev = c;
    }
    parts.push(text[start..].trim());
    parts
}

/// Split `name: Type` at the first single colon at depth zero
fn split_annotation(param: &str) -> Option<(&str, &str)> {
    let bytes = param.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' | b'>' => depth -= 1,
            b':' if depth == 0 => {
                let doubled = bytes.get(i + 1) == Some(&b':') || (i > 0 && bytes[i - 1] == b':');
                if !doubled {
                    let name = param[..i].trim();
                    let ty = param[i + 1..].trim();
                    if !name.is_empty() && !ty.is_empty() {
                        return Some((name, ty));
                    }
                    return None;
                }
            }
            _ => {}
        }
    }
    None
}

fn normalize_type(ty: &str) -> String {
    ty.chars().filter(|c| !c.is_whitespace()).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pattern(text: &str) -> SignaturePattern {
        text.parse().expect("pattern should parse")
    }

    #[test]
    fn test_pattern_matches_by_order_and_arity() {
        let p = pattern("process(int, String)");
        assert!(p.matches_signature("process(count: int, label: String)"));
        assert!(!p.matches_signature("process(label: String, count: int)"));
        assert!(!p.matches_signature("process(count: int)"));
        assert!(!p.matches_signature("handle(count: int, label: String)"));
    }

    #[test]
    fn test_pattern_ignores_whitespace_and_param_names() {
        let p = pattern("merge( Vec<u8> ,HashMap<String, i32>)");
        assert!(p.matches_signature("merge(bytes: Vec< u8 >, index: HashMap<String,i32>)"));
    }

    #[test]
    fn test_wildcards() {
        let p = pattern("process(*, _)");
        assert!(p.matches_signature("process(a: int, b)"));
        assert!(!p.matches_signature("process(a: int)"));

        let any_arity = pattern("process");
        assert!(any_arity.matches_signature("process()"));
        assert!(any_arity.matches_signature("process(a, b, c)"));
    }

    #[test]
    fn test_untyped_param_only_matches_wildcard() {
        assert!(!pattern("render(String)").matches_signature("render(label)"));
        assert!(pattern("render(?)").matches_signature("render(label)"));
    }

    #[test]
    fn test_return_type_constraint() {
        let p = pattern("load(Path) -> Config");
        assert!(p.matches_signature("load(path: Path) -> Config"));
        assert!(!p.matches_signature("load(path: Path) -> Settings"));
        assert!(!p.matches_signature("load(path: Path)"));
        assert!(pattern("load(Path)").matches_signature("load(path: Path) -> Settings"));
    }

    #[test]
    fn test_parse_shape_with_paths_and_closures() {
        let shape = SignatureShape::parse(
            "apply(f: &mut std::fmt::Formatter<'_>, cb: impl Fn(i32) -> bool) -> std::fmt::Result",
        )
        .expect("signature should parse");
        assert_eq!(shape.name, "apply");
        assert_eq!(shape.arity(), 2);
        assert_eq!(
            shape.params[0].type_name.as_deref(),
            Some("&mutstd::fmt::Formatter<'_>")
        );
        assert_eq!(shape.params[1].type_name.as_deref(), Some("implFn(i32)->bool"));
        assert_eq!(shape.return_type.as_deref(), Some("std::fmt::Result"));
    }

    #[test]
    fn test_render_normalizes() {
        let rendered = SignatureShape::render(
            "process",
            &[
                ("count".to_string(), Some("int".to_string())),
                ("label".to_string(), Some("Dict[str,  int]".to_string())),
                ("rest".to_string(), None),
            ],
            Some("bool"),
        );
        assert_eq!(rendered, "process(count: int, label: Dict[str, int], rest) -> bool");
        assert_eq!(SignatureShape::render("main", &[], None), "main()");
    }

    #[test]
    fn test_invalid_patterns() {
        assert!("(int)".parse::<SignaturePattern>().is_err());
        assert!("process(int".parse::<SignaturePattern>().is_err());
    }
}
