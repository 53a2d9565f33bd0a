//! Embedding generation for code symbols
//!
//! The endpoint is a black-box text to vector function behind
//! [`EmbeddingProvider`]. Two providers ship here: any OpenAI-compatible
//! HTTP endpoint, and a deterministic hashed provider for tests and
//! offline use.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use codegraph_core::config::EmbeddingsConfig;
use codegraph_core::error::Result;
use std::sync::Arc;

mod api_provider;
pub mod error;
mod mock_provider;
pub mod provider;
pub mod tokenizer;

pub use api_provider::OpenAiApiProvider;
pub use error::EmbeddingError;
pub use mock_provider::MockEmbeddingProvider;
pub use provider::EmbeddingProvider;
pub use tokenizer::tokenize;

/// Build the provider named by `embeddings.provider`
pub fn create_embedding_provider(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.to_lowercase().as_str() {
        "mock" => Ok(Arc::new(
            MockEmbeddingProvider::new(config.embedding_dimension)
                .with_max_input_chars(config.max_input_chars),
        )),
        "openai" => Ok(Arc::new(OpenAiApiProvider::new(config)?)),
        other => Err(EmbeddingError::UnsupportedProvider(other.to_string()).into()),
    }
}

/// Manager for handling embedding generation with immutable configuration
pub struct EmbeddingManager {
    provider: Arc<dyn EmbeddingProvider>,
    model_version: String,
}

impl EmbeddingManager {
    /// Creates a new embedding manager with the specified provider and model version
    pub fn new(provider: Arc<dyn EmbeddingProvider>, model_version: impl Into<String>) -> Self {
        Self {
            provider,
            model_version: model_version.into(),
        }
    }

    /// Initialize manager from configuration
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let provider = create_embedding_provider(config)?;
        let model_version = match config.provider.as_str() {
            "mock" => format!("mock-{}", config.embedding_dimension),
            _ => config.model.clone(),
        };
        Ok(Self::new(provider, model_version))
    }

    /// Shared handle to the provider
    pub fn provider(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.provider)
    }

    /// Model identifier, mixed into embedding text hashes so that a model
    /// change re-embeds everything
    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Generate embeddings for texts
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>> {
        self.provider.embed(texts).await
    }
}
