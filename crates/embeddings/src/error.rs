//! Error types for the embeddings module

use thiserror::Error;

/// Errors that can occur during embedding operations
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The endpoint could not be reached or kept failing after retries
    #[error("Embedding request failed: {0}")]
    RequestFailed(String),

    /// The endpoint returned vectors of the wrong length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Unsupported provider
    #[error("Unsupported embedding provider: {0}")]
    UnsupportedProvider(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<EmbeddingError> for codegraph_core::error::Error {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::UnsupportedProvider(_) | EmbeddingError::ConfigError(_) => {
                codegraph_core::error::Error::config(err.to_string())
            }
            other => codegraph_core::error::Error::embedding(other.to_string()),
        }
    }
}
