//! Trait definition for embedding providers

use async_trait::async_trait;
use codegraph_core::error::Result;

/// Text to vector endpoint
///
/// Implementations report failures per item where they can: a text that is
/// too long or that the endpoint rejected yields `None` at its position
/// instead of failing the whole call. An `Err` means no item could be
/// embedded (endpoint unreachable, retries exhausted).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a list of texts, one slot per input
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>>;

    /// The size of the embedding vectors produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Longest text, in characters, the provider accepts
    fn max_input_chars(&self) -> usize;
}
