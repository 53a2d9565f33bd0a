//! Line-based fallback extraction for languages without a grammar adapter
//!
//! Only top-level declarations (lines starting in column 0) are recognized,
//! and only as `type`, `interface` or `function` nodes. No edges are
//! produced. Records are tagged `degraded`.

use codegraph_core::entities::{ExtractionRecord, Language, SourceSpan, SymbolKind, SymbolNode};
use codegraph_core::entity_id::{content_fingerprint, derive_module_path, ScopeContext};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const MODIFIERS: &str = r"(?:(?:public|private|protected|internal|fileprivate|abstract|final|sealed|open|static|data|inline|export|partial|readonly|unsafe|extern|override|case|implicit|lazy|typedef|template\s*<[^>]*>)\s+)*";

static TYPE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^{MODIFIERS}(?:class|struct|enum(?:\s+class)?|record|object|module|union)\s+([A-Za-z_][A-Za-z0-9_]*)"
    ))
    .ok()
});

static INTERFACE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^{MODIFIERS}(?:interface|protocol|trait)\s+([A-Za-z_][A-Za-z0-9_]*)"
    ))
    .ok()
});

static KEYWORD_FUNCTION_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^{MODIFIERS}(?:fun|def|func|function)\s+(?:[A-Za-z_][A-Za-z0-9_]*\.)?([A-Za-z_][A-Za-z0-9_]*[?!]?)"
    ))
    .ok()
});

/// `int main(void) {`, `static const char *name(int x)`, `void Foo::bar() {`
static C_FUNCTION_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:static|inline|extern|const|unsigned|signed|struct|virtual)\s+)*[A-Za-z_][A-Za-z0-9_:<>]*[\s\*&]+\**([A-Za-z_][A-Za-z0-9_:~]*)\s*\([^;]*$",
    )
    .ok()
});

const C_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "return", "sizeof", "else"];

#[derive(Clone, Copy)]
enum LinePattern {
    Type,
    Interface,
    KeywordFunction,
    CFunction,
}

impl LinePattern {
    fn regex(self) -> Option<&'static Regex> {
        match self {
            Self::Type => TYPE_PATTERN.as_ref(),
            Self::Interface => INTERFACE_PATTERN.as_ref(),
            Self::KeywordFunction => KEYWORD_FUNCTION_PATTERN.as_ref(),
            Self::CFunction => C_FUNCTION_PATTERN.as_ref(),
        }
    }

    fn kind(self) -> SymbolKind {
        match self {
            Self::Type => SymbolKind::Type,
            Self::Interface => SymbolKind::Interface,
            Self::KeywordFunction | Self::CFunction => SymbolKind::Function,
        }
    }
}

fn patterns_for(language: Language) -> &'static [LinePattern] {
    use LinePattern::*;
    match language {
        Language::C | Language::Cpp => &[Type, CFunction],
        Language::Java | Language::CSharp => &[Interface, Type],
        // Kotlin, Scala, Swift, PHP, Ruby and explicitly requested unknown languages
        _ => &[Interface, Type, KeywordFunction],
    }
}

/// Whether a language is handled by the degraded extractor
pub fn is_degraded_language(language: Language) -> bool {
    matches!(
        language,
        Language::Java
            | Language::Kotlin
            | Language::C
            | Language::Cpp
            | Language::CSharp
            | Language::Ruby
            | Language::Php
            | Language::Swift
            | Language::Scala
    )
}

/// Scan top-level declarations line by line
pub fn extract_degraded(file_path: &str, source: &str, language: Language) -> ExtractionRecord {
    let mut record = ExtractionRecord::empty(file_path, language);
    record.degraded = true;

    let module_path = derive_module_path(file_path, language);
    let scope = ScopeContext::new(module_path.as_deref(), language.separator());
    let patterns = patterns_for(language);
    let mut seen = HashSet::new();

    for (row, line) in source.lines().enumerate() {
        if line.starts_with(char::is_whitespace) || is_comment(line) {
            continue;
        }
        let Some((pattern, name)) = patterns.iter().find_map(|pattern| {
            let captures = pattern.regex()?.captures(line)?;
            let name = captures.get(1)?.as_str();
            Some((*pattern, name))
        }) else {
            continue;
        };

        let name = name.rsplit("::").next().unwrap_or(name);
        if matches!(pattern, LinePattern::CFunction) && C_KEYWORDS.contains(&name) {
            continue;
        }

        let line_number = row + 1;
        let node = SymbolNode::new(
            pattern.kind(),
            name,
            scope.build_qualified_name(name),
            file_path,
            SourceSpan::new(line_number, 0, line_number, line.len()),
            language,
        )
        .with_body_fingerprint(content_fingerprint(line.as_bytes()))
        .degraded();

        if seen.insert(node.id.clone()) {
            record.nodes.push(node);
        }
    }

    record
}

fn is_comment(line: &str) -> bool {
    ["//", "/*", "*", "#", "--"]
        .iter()
        .any(|marker| line.starts_with(marker))
}
