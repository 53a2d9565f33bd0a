//! OpenAI-compatible API provider for embeddings (OpenAI, vLLM, Ollama, etc.)

use crate::{error::EmbeddingError, provider::EmbeddingProvider};
use async_openai::types::{CreateEmbeddingRequest, EmbeddingInput};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use codegraph_core::config::EmbeddingsConfig;
use codegraph_core::error::Result;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Upper bound on the characters sent in one request
const MAX_BATCH_CHARS: usize = 32768;

const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

/// OpenAI-compatible API provider
pub struct OpenAiApiProvider {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
    max_input_chars: usize,
    batch_size: usize,
    max_concurrent: usize,
    concurrency_limiter: Arc<Semaphore>,
    retry_attempts: usize,
}

impl OpenAiApiProvider {
    /// Create a new API provider from configuration
    ///
    /// The API key comes from the configuration, or from `OPENAI_API_KEY`
    /// when the configuration has none.
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        if config.texts_per_api_request == 0 || config.max_concurrent_api_requests == 0 {
            return Err(EmbeddingError::ConfigError(
                "texts_per_api_request and max_concurrent_api_requests must be positive"
                    .to_string(),
            )
            .into());
        }
        let base_url = config.api_base_url.clone().ok_or_else(|| {
            EmbeddingError::ConfigError("api_base_url is required for the openai provider".to_string())
        })?;

        info!("Initializing OpenAI-compatible API embeddings");
        info!("  Model: {}", config.model);
        info!("  Dimensions: {}", config.embedding_dimension);
        info!("  Base URL: {}", base_url);

        let mut openai_config = OpenAIConfig::new().with_api_base(&base_url);
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        if let Some(api_key) = api_key {
            openai_config = openai_config.with_api_key(api_key);
        }

        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            dimensions: config.embedding_dimension,
            max_input_chars: config.max_input_chars,
            batch_size: config.texts_per_api_request,
            max_concurrent: config.max_concurrent_api_requests,
            concurrency_limiter: Arc::new(Semaphore::new(config.max_concurrent_api_requests)),
            retry_attempts: config.retry_attempts,
        })
    }

    /// Group texts into requests bounded by item count and total characters
    fn build_batches(&self, texts: &[String]) -> (Vec<Vec<(usize, String)>>, usize) {
        let mut batches: Vec<Vec<(usize, String)>> = Vec::new();
        let mut current_batch: Vec<(usize, String)> = Vec::new();
        let mut current_batch_chars = 0usize;
        let mut skipped = 0usize;

        for (index, text) in texts.iter().enumerate() {
            let char_count = text.chars().count();
            if char_count > self.max_input_chars {
                skipped += 1;
                debug!(
                    "Text at index {index} exceeds max_input_chars ({char_count} > {}), skipping",
                    self.max_input_chars
                );
                continue;
            }
            if current_batch_chars + char_count > MAX_BATCH_CHARS && !current_batch.is_empty() {
                batches.push(std::mem::take(&mut current_batch));
                current_batch_chars = 0;
            }
            current_batch.push((index, text.clone()));
            current_batch_chars += char_count;
            if current_batch.len() >= self.batch_size {
                batches.push(std::mem::take(&mut current_batch));
                current_batch_chars = 0;
            }
        }
        if !current_batch.is_empty() {
            batches.push(current_batch);
        }
        (batches, skipped)
    }

    /// One request with retries; returns `(original index, vector)` pairs
    async fn embed_batch(
        &self,
        batch: Vec<(usize, String)>,
    ) -> std::result::Result<Vec<(usize, Vec<f32>)>, EmbeddingError> {
        let (indices, texts): (Vec<usize>, Vec<String>) = batch.into_iter().unzip();

        let _permit = self
            .concurrency_limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| {
                EmbeddingError::RequestFailed(format!("Failed to acquire concurrency permit: {e}"))
            })?;

        let mut attempt = 0usize;
        loop {
            let request = CreateEmbeddingRequest {
                model: self.model.clone(),
                input: EmbeddingInput::StringArray(texts.clone()),
                encoding_format: None,
                dimensions: None,
                user: None,
            };

            match self.client.embeddings().create(request).await {
                Ok(response) => {
                    let mut vectors: Vec<(usize, Vec<f32>)> = response
                        .data
                        .into_iter()
                        .map(|emb| (emb.index as usize, emb.embedding))
                        .collect();
                    vectors.sort_by_key(|(idx, _)| *idx);

                    if let Some((_, bad)) = vectors.iter().find(|(_, v)| v.len() != self.dimensions)
                    {
                        return Err(EmbeddingError::DimensionMismatch {
                            expected: self.dimensions,
                            actual: bad.len(),
                        });
                    }

                    return Ok(indices
                        .into_iter()
                        .zip(vectors.into_iter().map(|(_, v)| v))
                        .collect());
                }
                Err(e) if attempt < self.retry_attempts => {
                    attempt += 1;
                    let backoff_ms = INITIAL_BACKOFF_MS
                        .saturating_mul(1u64 << (attempt - 1).min(16))
                        .min(MAX_BACKOFF_MS);
                    warn!(
                        error = %e,
                        texts = texts.len(),
                        "Embedding request failed, retrying in {backoff_ms}ms (attempt {attempt}/{})",
                        self.retry_attempts
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    return Err(EmbeddingError::RequestFailed(format!(
                        "API request failed after {} attempts: {e}",
                        attempt + 1
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiApiProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = vec![None; texts.len()];
        let (batches, skipped) = self.build_batches(&texts);
        if skipped > 0 {
            warn!(
                "Skipped {skipped}/{} texts exceeding max length of {} chars",
                texts.len(),
                self.max_input_chars
            );
        }
        if batches.is_empty() {
            return Ok(all_embeddings);
        }

        let batch_count = batches.len();
        let results = stream::iter(batches)
            .map(|batch| self.embed_batch(batch))
            .buffer_unordered(self.max_concurrent)
            .collect::<Vec<_>>()
            .await;

        let mut last_error = None;
        let mut failed_batches = 0usize;
        for result in results {
            match result {
                Ok(pairs) => {
                    for (index, embedding) in pairs {
                        all_embeddings[index] = Some(embedding);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Embedding batch failed");
                    failed_batches += 1;
                    last_error = Some(e);
                }
            }
        }

        // Nothing came back at all: surface the endpoint failure
        if failed_batches == batch_count {
            if let Some(e) = last_error {
                return Err(e.into());
            }
        }
        Ok(all_embeddings)
    }

    fn embedding_dimension(&self) -> usize {
        self.dimensions
    }

    fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }
}
