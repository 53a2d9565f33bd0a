//! Configuration module for the codegraph system
//!
//! Configuration can be loaded from TOML files and/or environment variables.
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration that indexes into in-memory stores with the mock embedder.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use crate::resolution::TieBreak;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use defaults::*;

/// Returns the path to the global configuration file (`~/.codegraph/config.toml`)
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".codegraph").join("config.toml"))
}

/// Indexer and reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Files reconciled concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Retries of a file after a transient store error
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay; doubled on each attempt
    #[serde(default = "default_retry_initial_backoff_ms")]
    pub retry_initial_backoff_ms: u64,

    /// Upper bound on the retry delay
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,

    /// Files larger than this many bytes are skipped
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Index files without a grammar adapter with the line-based extractor
    #[serde(default = "default_true")]
    pub include_degraded_languages: bool,

    /// Honour `.gitignore` and friends during full walks
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,

    /// Abort parsing a single file after this long; the record is partial
    #[serde(default = "default_parse_timeout_ms")]
    pub parse_timeout_ms: u64,

    /// Cap on query matches per file
    #[serde(default = "default_query_match_limit")]
    pub query_match_limit: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_retries: default_max_retries(),
            retry_initial_backoff_ms: default_retry_initial_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
            max_file_size: default_max_file_size(),
            include_degraded_languages: true,
            respect_gitignore: true,
            parse_timeout_ms: default_parse_timeout_ms(),
            query_match_limit: default_query_match_limit(),
        }
    }
}

/// Configuration for embeddings generation
///
/// # Providers
/// - `mock` (default): deterministic hashed vectors, no network
/// - `openai`: any OpenAI-compatible `/embeddings` endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Provider type: "mock" or "openai"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model name to use
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL for the openai provider
    #[serde(default = "default_api_base_url")]
    pub api_base_url: Option<String>,

    /// API key (or use the OPENAI_API_KEY env var)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Embedding dimension size
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Number of texts sent in a single embedding request
    #[serde(default = "default_texts_per_api_request")]
    pub texts_per_api_request: usize,

    /// Longest text accepted by the endpoint, in characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Lines of the symbol body included in its embedding text
    #[serde(default = "default_snippet_max_lines")]
    pub snippet_max_lines: usize,

    /// Maximum concurrent embedding API requests
    #[serde(default = "default_max_concurrent_api_requests")]
    pub max_concurrent_api_requests: usize,

    /// Number of retry attempts for failed embedding requests
    #[serde(default = "default_embedding_retry_attempts")]
    pub retry_attempts: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_model(),
            api_base_url: default_api_base_url(),
            api_key: None,
            embedding_dimension: default_embedding_dimension(),
            texts_per_api_request: default_texts_per_api_request(),
            max_input_chars: default_max_input_chars(),
            snippet_max_lines: default_snippet_max_lines(),
            max_concurrent_api_requests: default_max_concurrent_api_requests(),
            retry_attempts: default_embedding_retry_attempts(),
        }
    }
}

impl std::fmt::Debug for EmbeddingsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingsConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .field("embedding_dimension", &self.embedding_dimension)
            .field("texts_per_api_request", &self.texts_per_api_request)
            .field("max_input_chars", &self.max_input_chars)
            .field("snippet_max_lines", &self.snippet_max_lines)
            .field(
                "max_concurrent_api_requests",
                &self.max_concurrent_api_requests,
            )
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

/// Graph and vector store configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Graph backend: "memory" or "neo4j"
    #[serde(default = "default_graph_backend")]
    pub graph_backend: String,

    /// Vector backend: "memory" or "qdrant"
    #[serde(default = "default_vector_backend")]
    pub vector_backend: String,

    #[serde(default = "default_neo4j_uri")]
    pub neo4j_uri: String,

    #[serde(default = "default_neo4j_user")]
    pub neo4j_user: String,

    #[serde(default)]
    pub neo4j_password: Option<String>,

    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Qdrant collection holding symbol vectors
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            graph_backend: default_graph_backend(),
            vector_backend: default_vector_backend(),
            neo4j_uri: default_neo4j_uri(),
            neo4j_user: default_neo4j_user(),
            neo4j_password: None,
            qdrant_url: default_qdrant_url(),
            collection_name: default_collection_name(),
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("graph_backend", &self.graph_backend)
            .field("vector_backend", &self.vector_backend)
            .field("neo4j_uri", &self.neo4j_uri)
            .field("neo4j_user", &self.neo4j_user)
            .field(
                "neo4j_password",
                &self.neo4j_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("qdrant_url", &self.qdrant_url)
            .field("collection_name", &self.collection_name)
            .finish()
    }
}

/// Query engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Results returned by semantic search when no limit is given
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Vector hits fetched per requested result before re-ranking
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// Weight of the lexical bonus added to the similarity score, in [0, 1]
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    /// Largest accepted traversal depth for callers/callees
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
            lexical_weight: default_lexical_weight(),
            max_depth: default_max_depth(),
        }
    }
}

/// Name resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Ordering among same-named candidates
    #[serde(default = "default_tie_break")]
    pub tie_break: TieBreak,

    /// Most candidates recorded for one ambiguous reference
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            tie_break: default_tie_break(),
            max_candidates: default_max_candidates(),
        }
    }
}

/// File watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Quiet period before a file event is emitted
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Events reconciled together
    #[serde(default = "default_watch_batch_size")]
    pub batch_size: usize,

    /// Flush a partial batch after this long
    #[serde(default = "default_watch_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    /// Glob patterns never reported
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            batch_size: default_watch_batch_size(),
            batch_timeout_ms: default_watch_batch_timeout_ms(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

impl WatcherConfig {
    pub fn debounce_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

/// Main configuration structure for the codegraph system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub resolution: ResolutionConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,
}

impl Config {
    /// Create a new ConfigBuilder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        let valid_providers = ["mock", "openai"];
        if !valid_providers.contains(&self.embeddings.provider.as_str()) {
            return Err(Error::config(format!(
                "Invalid provider '{}'. Must be one of: {:?}",
                self.embeddings.provider, valid_providers
            )));
        }

        if self.embeddings.provider == "openai"
            && self
                .embeddings
                .api_base_url
                .as_deref()
                .is_none_or(|u| u.trim().is_empty())
        {
            return Err(Error::config(
                "embeddings.api_base_url is required for the openai provider".to_string(),
            ));
        }

        if self.embeddings.embedding_dimension == 0 {
            return Err(Error::config(
                "embedding_dimension must be greater than 0".to_string(),
            ));
        }

        if self.embeddings.texts_per_api_request == 0 {
            return Err(Error::config(
                "embeddings.texts_per_api_request must be greater than 0".to_string(),
            ));
        }

        if self.embeddings.max_input_chars < 64 {
            return Err(Error::config(format!(
                "embeddings.max_input_chars too small (min 64, got {})",
                self.embeddings.max_input_chars
            )));
        }

        if self.embeddings.max_concurrent_api_requests == 0 {
            return Err(Error::config(
                "embeddings.max_concurrent_api_requests must be greater than 0".to_string(),
            ));
        }
        if self.embeddings.max_concurrent_api_requests > 256 {
            return Err(Error::config(format!(
                "embeddings.max_concurrent_api_requests too large (max 256, got {})",
                self.embeddings.max_concurrent_api_requests
            )));
        }

        if self.indexer.max_concurrency == 0 {
            return Err(Error::config(
                "indexer.max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.indexer.retry_initial_backoff_ms > self.indexer.retry_max_backoff_ms {
            return Err(Error::config(format!(
                "indexer.retry_initial_backoff_ms ({}) exceeds retry_max_backoff_ms ({})",
                self.indexer.retry_initial_backoff_ms, self.indexer.retry_max_backoff_ms
            )));
        }

        let valid_graph_backends = ["memory", "neo4j"];
        if !valid_graph_backends.contains(&self.storage.graph_backend.as_str()) {
            return Err(Error::config(format!(
                "Invalid graph backend '{}'. Must be one of: {:?}",
                self.storage.graph_backend, valid_graph_backends
            )));
        }
        if self.storage.graph_backend == "neo4j" && self.storage.neo4j_uri.trim().is_empty() {
            return Err(Error::config("storage.neo4j_uri cannot be empty".to_string()));
        }

        let valid_vector_backends = ["memory", "qdrant"];
        if !valid_vector_backends.contains(&self.storage.vector_backend.as_str()) {
            return Err(Error::config(format!(
                "Invalid vector backend '{}'. Must be one of: {:?}",
                self.storage.vector_backend, valid_vector_backends
            )));
        }
        if self.storage.vector_backend == "qdrant" && self.storage.qdrant_url.trim().is_empty() {
            return Err(Error::config("storage.qdrant_url cannot be empty".to_string()));
        }

        if self.query.default_top_k == 0 {
            return Err(Error::config(
                "query.default_top_k must be greater than 0".to_string(),
            ));
        }
        if self.query.candidate_multiplier == 0 {
            return Err(Error::config(
                "query.candidate_multiplier must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.query.lexical_weight) {
            return Err(Error::config(format!(
                "query.lexical_weight must be within [0, 1] (got {})",
                self.query.lexical_weight
            )));
        }
        if self.query.max_depth == 0 {
            return Err(Error::config(
                "query.max_depth must be greater than 0".to_string(),
            ));
        }

        if self.resolution.max_candidates == 0 {
            return Err(Error::config(
                "resolution.max_candidates must be greater than 0".to_string(),
            ));
        }

        if self.watcher.batch_size == 0 {
            return Err(Error::config(
                "watcher.batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Fluent builder for [`Config`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn indexer(mut self, indexer: IndexerConfig) -> Self {
        self.config.indexer = indexer;
        self
    }

    pub fn embeddings(mut self, embeddings: EmbeddingsConfig) -> Self {
        self.config.embeddings = embeddings;
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn query(mut self, query: QueryConfig) -> Self {
        self.config.query = query;
        self
    }

    pub fn resolution(mut self, resolution: ResolutionConfig) -> Self {
        self.config.resolution = resolution;
        self
    }

    pub fn watcher(mut self, watcher: WatcherConfig) -> Self {
        self.config.watcher = watcher;
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
