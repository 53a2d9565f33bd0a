//! Default values and functions for configuration

use crate::resolution::TieBreak;

// Default constants
pub(crate) const DEFAULT_EMBEDDING_PROVIDER: &str = "mock";
pub(crate) const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub(crate) const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_GRAPH_BACKEND: &str = "memory";
pub(crate) const DEFAULT_VECTOR_BACKEND: &str = "memory";
pub(crate) const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
pub(crate) const DEFAULT_NEO4J_USER: &str = "neo4j";
pub(crate) const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub(crate) const DEFAULT_COLLECTION_NAME: &str = "codegraph_symbols";

/// Files larger than this are skipped during discovery (10 MiB)
pub(crate) const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub(crate) fn default_max_concurrency() -> usize {
    8
}

pub(crate) fn default_max_retries() -> u32 {
    3
}

pub(crate) fn default_retry_initial_backoff_ms() -> u64 {
    200
}

pub(crate) fn default_retry_max_backoff_ms() -> u64 {
    10_000
}

pub(crate) fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_parse_timeout_ms() -> u64 {
    5_000
}

pub(crate) fn default_query_match_limit() -> u32 {
    10_000
}

pub(crate) fn default_embedding_provider() -> String {
    DEFAULT_EMBEDDING_PROVIDER.to_string()
}

pub(crate) fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

pub(crate) fn default_api_base_url() -> Option<String> {
    Some(DEFAULT_API_BASE_URL.to_string())
}

pub(crate) fn default_embedding_dimension() -> usize {
    384
}

pub(crate) fn default_texts_per_api_request() -> usize {
    32
}

pub(crate) fn default_max_input_chars() -> usize {
    8_000
}

pub(crate) fn default_snippet_max_lines() -> usize {
    40
}

pub(crate) fn default_max_concurrent_api_requests() -> usize {
    4
}

pub(crate) fn default_embedding_retry_attempts() -> usize {
    5
}

pub(crate) fn default_graph_backend() -> String {
    DEFAULT_GRAPH_BACKEND.to_string()
}

pub(crate) fn default_vector_backend() -> String {
    DEFAULT_VECTOR_BACKEND.to_string()
}

pub(crate) fn default_neo4j_uri() -> String {
    DEFAULT_NEO4J_URI.to_string()
}

pub(crate) fn default_neo4j_user() -> String {
    DEFAULT_NEO4J_USER.to_string()
}

pub(crate) fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

pub(crate) fn default_collection_name() -> String {
    DEFAULT_COLLECTION_NAME.to_string()
}

pub(crate) fn default_top_k() -> usize {
    10
}

pub(crate) fn default_candidate_multiplier() -> usize {
    3
}

pub(crate) fn default_lexical_weight() -> f32 {
    0.15
}

pub(crate) fn default_max_depth() -> usize {
    10
}

pub(crate) fn default_tie_break() -> TieBreak {
    TieBreak::ShortestQualifiedName
}

pub(crate) fn default_max_candidates() -> usize {
    16
}

pub(crate) fn default_debounce_ms() -> u64 {
    500
}

pub(crate) fn default_watch_batch_size() -> usize {
    100
}

pub(crate) fn default_watch_batch_timeout_ms() -> u64 {
    1_000
}

pub(crate) fn default_ignore_patterns() -> Vec<String> {
    vec![
        "*.tmp".to_string(),
        "*.tmp.*".to_string(),
        "*.swp".to_string(),
        "*.swo".to_string(),
        "*~".to_string(),
        "*.bak".to_string(),
        "*.orig".to_string(),
        "*.log".to_string(),
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/__pycache__/**".to_string(),
    ]
}
