//! Embedding provider trait and the batching client used by the store.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{FutureExt, StreamExt, TryStreamExt, stream};
use tracing::{debug, error};

use crate::config::RagConfig;
use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (OpenAI, local models, etc.)
/// behind a unified async interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// Providers own their retry and timeout policy. Nothing above them retries.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for one batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name used in logs and error messages.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Validating, batching front-end over an [`EmbeddingProvider`].
///
/// [`embed_many`](EmbeddingClient::embed_many) splits its input into batches of
/// at most `batch_size` texts and keeps at most `max_concurrency` of them in
/// flight. Results are reassembled in input order regardless of completion
/// order, and the first failing batch fails the whole call; batches still in
/// flight at that point are dropped.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_concurrency: usize,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("provider", &self.provider.name())
            .field("batch_size", &self.batch_size)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

impl EmbeddingClient {
    /// Create a client with the default batch size (100) and concurrency (4).
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let defaults = RagConfig::default();
        Self {
            provider,
            batch_size: defaults.embedding_batch_size,
            max_concurrency: defaults.max_concurrent_batches,
        }
    }

    /// Create a client using the batching fields of a [`RagConfig`].
    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &RagConfig) -> Self {
        Self::new(provider)
            .with_batch_size(config.embedding_batch_size)
            .with_max_concurrency(config.max_concurrent_batches)
    }

    /// Set the maximum number of texts per provider request. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set how many provider requests may run concurrently. Zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed a single non-empty text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ValidationError`] if `text` is empty or whitespace-only.
    /// Provider errors are returned unchanged.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::ValidationError(
                "text is required and cannot be empty".to_string(),
            ));
        }
        self.provider.embed(text).await
    }

    /// Embed many texts, returning one vector per input in input order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ValidationError`] if `texts` is empty or contains an
    /// empty or whitespace-only entry, and [`RagError::EmbeddingError`] if a
    /// batch comes back with the wrong number of vectors. Provider errors are
    /// returned unchanged.
    pub async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(RagError::ValidationError("texts list cannot be empty".to_string()));
        }
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(RagError::ValidationError(format!(
                "text at position {pos} is empty"
            )));
        }

        debug!(
            provider = self.provider.name(),
            text_count = texts.len(),
            batch_size = self.batch_size,
            max_concurrency = self.max_concurrency,
            "embedding texts"
        );

        let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(self.batch_size))
            .map(|batch| self.embed_checked(batch))
            .buffered(self.max_concurrency)
            .try_collect()
            .boxed()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    async fn embed_checked(&self, batch: &[&str]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.provider.embed_batch(batch).await.map_err(|e| {
            error!(provider = self.provider.name(), error = %e, "embedding batch failed");
            e
        })?;
        if embeddings.len() != batch.len() {
            return Err(RagError::EmbeddingError {
                provider: self.provider.name().to_string(),
                message: format!(
                    "provider returned {} embeddings for {} inputs",
                    embeddings.len(),
                    batch.len()
                ),
            });
        }
        Ok(embeddings)
    }
}
