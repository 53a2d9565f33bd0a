//! Per-file extraction entry point
//!
//! [`ParserManager::extract`] picks the grammar adapter for the file's
//! language (from the extension unless a tag is given), falls back to the
//! degraded line scanner for languages without a grammar, and returns a
//! language-agnostic [`ExtractionRecord`].

use crate::adapter::GrammarAdapter;
use crate::degraded::{extract_degraded, is_degraded_language};
use crate::extraction_framework::{extract_with_adapter, ExtractionOptions};
use codegraph_core::config::Config;
use codegraph_core::entities::{ExtractionRecord, Language};
use codegraph_core::error::{Error, Result};
use codegraph_core::resolution::TieBreak;
use std::path::Path;
use tracing::{debug, warn};

/// Settings for extraction, usually taken from [`Config`]
#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub tie_break: TieBreak,
    /// Cap on the number of edges recorded for one ambiguous name
    pub max_candidates: usize,
    pub parse_timeout_ms: u64,
    pub query_match_limit: u32,
    /// Route languages without a grammar to the degraded extractor instead of failing
    pub include_degraded: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ParserOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tie_break: config.resolution.tie_break,
            max_candidates: config.resolution.max_candidates,
            parse_timeout_ms: config.indexer.parse_timeout_ms,
            query_match_limit: config.indexer.query_match_limit,
            include_degraded: config.indexer.include_degraded_languages,
        }
    }
}

/// Drives tree-sitter parsing and grammar adapters for individual files
///
/// The manager holds no parser state; a parser is created per call and the
/// compiled queries are shared process-wide, so one instance can serve
/// concurrent extractions.
#[derive(Debug, Clone, Default)]
pub struct ParserManager {
    options: ParserOptions,
}

impl ParserManager {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ParserOptions::from_config(config))
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Language tag inferred from a file's extension
    pub fn detect_language(file_path: &str) -> Language {
        Language::from_path(Path::new(file_path))
    }

    /// Whether files of this language are extracted (fully or degraded)
    pub fn supports(&self, language: Language) -> bool {
        GrammarAdapter::for_language(language).is_some()
            || (self.options.include_degraded && is_degraded_language(language))
    }

    /// Extract symbols and edges from one file
    ///
    /// Syntax errors and parse timeouts do not fail the call: the record
    /// holds whatever was extracted and its `failure` field is set. An
    /// error is returned only when no extractor accepts the language.
    pub fn extract(
        &self,
        file_path: &str,
        content: &str,
        language: Option<Language>,
    ) -> Result<ExtractionRecord> {
        let explicit = language.is_some();
        let language = language.unwrap_or_else(|| Self::detect_language(file_path));

        if let Some(adapter) = GrammarAdapter::for_language(language) {
            let options = ExtractionOptions {
                tie_break: self.options.tie_break,
                max_candidates: self.options.max_candidates,
                parse_timeout_ms: self.options.parse_timeout_ms,
                query_match_limit: self.options.query_match_limit,
            };
            let record = extract_with_adapter(adapter, file_path, content, &options)?;
            if let Some(failure) = &record.failure {
                warn!(
                    file_path = %file_path,
                    line = ?failure.line,
                    reason = %failure.message,
                    "Partial extraction"
                );
            }
            return Ok(record);
        }

        let degraded_allowed = is_degraded_language(language)
            || (explicit && language == Language::Unknown);
        if self.options.include_degraded && degraded_allowed {
            debug!(file_path = %file_path, language = %language, "Using degraded extractor");
            return Ok(extract_degraded(file_path, content, language));
        }

        Err(Error::parse(
            file_path,
            format!("unsupported language: {language}"),
        ))
    }
}
