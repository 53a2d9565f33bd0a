//! Deterministic offline embedding provider

use crate::provider::EmbeddingProvider;
use crate::tokenizer::tokenize;
use async_trait::async_trait;
use codegraph_core::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use twox_hash::XxHash3_64;

/// Hashed bag-of-tokens embeddings
///
/// Each token is hashed into one of `dimension` buckets with a hash-derived
/// sign, and the result is L2-normalized. Texts sharing identifier parts end
/// up close in cosine space, which is enough for tests and offline use.
pub struct MockEmbeddingProvider {
    dimension: usize,
    max_input_chars: usize,
    available: AtomicBool,
    /// Texts containing one of these markers get no vector
    failing_markers: RwLock<Vec<String>>,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            max_input_chars: 8000,
            available: AtomicBool::new(true),
            failing_markers: RwLock::new(Vec::new()),
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Make every call fail as if the endpoint were down
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Refuse to embed any text containing `marker`
    pub fn fail_texts_containing(&self, marker: impl Into<String>) {
        if let Ok(mut markers) = self.failing_markers.write() {
            markers.push(marker.into());
        }
    }

    /// Vector for one text
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let hash = XxHash3_64::oneshot(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn is_refused(&self, text: &str) -> bool {
        if text.chars().count() > self.max_input_chars {
            return true;
        }
        self.failing_markers
            .read()
            .map(|markers| markers.iter().any(|m| text.contains(m.as_str())))
            .unwrap_or(false)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::embedding("mock embedding endpoint is unavailable"));
        }
        Ok(texts
            .iter()
            .map(|text| (!self.is_refused(text)).then(|| self.embed_text(text)))
            .collect())
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }
}
