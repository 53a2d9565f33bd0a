//! Identifier-aware tokenization shared by the mock provider and lexical ranking

use unicode_segmentation::UnicodeSegmentation;

/// Split a camelCase or PascalCase word into its components
///
/// - "getUserName" → ["get", "User", "Name"]
/// - "HTTPResponse" → ["HTTP", "Response"]
fn split_camel_case(s: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    let mut prev_char: Option<char> = None;

    while let Some(ch) = chars.next() {
        let should_split = prev_char.is_some_and(|prev| {
            (prev.is_lowercase() && ch.is_uppercase())
                || (prev.is_uppercase()
                    && ch.is_uppercase()
                    && chars.peek().is_some_and(|next| next.is_lowercase()))
        });

        if should_split && !current.is_empty() {
            result.push(std::mem::take(&mut current));
        }

        current.push(ch);
        prev_char = Some(ch);
    }

    if !current.is_empty() {
        result.push(current);
    }

    result
}

/// Lowercased word parts of `text`, split on word boundaries, underscores
/// and case changes
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.unicode_words() {
        for part in word.split('_').filter(|p| !p.is_empty()) {
            tokens.extend(
                split_camel_case(part)
                    .into_iter()
                    .map(|sub| sub.to_lowercase()),
            );
        }
    }
    tokens
}
