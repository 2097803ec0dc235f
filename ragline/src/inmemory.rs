//! In-memory vector store.
//!
//! [`InMemoryVectorStore`] keeps three parallel arrays (chunk texts, an
//! embedding matrix and metadata) behind a single `tokio::sync::RwLock`.
//! Position `i` in each array refers to the same chunk. Writers append whole
//! batches under the write lock, so readers never observe a partially
//! appended batch, and searches only take the read lock.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{Metadata, MetadataValue, SIMILARITY_METHOD, SearchResult};
use crate::embedding::{EmbeddingClient, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::similarity::SimilarityMethod;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Summary of the store's current contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreStats {
    /// Number of stored chunks.
    pub num_documents: usize,
    /// Embedding dimension, or `None` while the store is empty.
    pub embedding_dimension: Option<usize>,
    /// Size of the embedding matrix in megabytes, rounded to two decimals.
    pub total_size_mb: f64,
}

/// The parallel arrays. Only ever touched under the store's lock.
#[derive(Debug, Default)]
struct Corpus {
    texts: Vec<String>,
    /// Row-major matrix with `texts.len()` rows of `dimension` columns.
    embeddings: Vec<f32>,
    metadata: Vec<Metadata>,
    dimension: Option<usize>,
}

impl Corpus {
    fn len(&self) -> usize {
        self.texts.len()
    }

    fn rows(&self, dimension: usize) -> impl Iterator<Item = &[f32]> {
        self.embeddings.chunks_exact(dimension)
    }

    /// The dimension a new row must have: the established one, or `first` for an empty corpus.
    fn expected_dimension(&self, first: usize) -> usize {
        self.dimension.unwrap_or(first)
    }

    fn push(&mut self, text: String, embedding: Vec<f32>, metadata: Metadata) {
        self.dimension.get_or_insert(embedding.len());
        self.texts.push(text);
        self.embeddings.extend_from_slice(&embedding);
        self.metadata.push(metadata);
    }
}

/// An in-memory vector store with cosine and Euclidean search.
///
/// The embedding dimension is fixed by the first inserted row and forgotten
/// again by [`clear`](InMemoryVectorStore::clear).
///
/// # Example
///
/// ```rust,ignore
/// use ragline::{InMemoryVectorStore, SimilarityMethod};
///
/// let store = InMemoryVectorStore::with_provider(Arc::new(my_embedder));
/// store.add_documents(texts, None).await?;
/// let results = store.search("breathing techniques", 2, SimilarityMethod::Cosine).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    corpus: RwLock<Corpus>,
    embedder: EmbeddingClient,
}

impl InMemoryVectorStore {
    /// Create an empty store that embeds through `embedder`.
    pub fn new(embedder: EmbeddingClient) -> Self {
        Self { corpus: RwLock::new(Corpus::default()), embedder }
    }

    /// Create an empty store with a default [`EmbeddingClient`] over `provider`.
    pub fn with_provider(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(EmbeddingClient::new(provider))
    }

    /// The embedding client used for bulk inserts and queries.
    pub fn embedder(&self) -> &EmbeddingClient {
        &self.embedder
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.corpus.read().await.len()
    }

    /// Returns `true` if the store holds no chunks.
    pub async fn is_empty(&self) -> bool {
        self.corpus.read().await.len() == 0
    }

    /// The established embedding dimension, if any.
    pub async fn dimension(&self) -> Option<usize> {
        self.corpus.read().await.dimension
    }

    /// Append one row with a precomputed embedding.
    ///
    /// `metadata` defaults to an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ValidationError`] for an empty embedding and
    /// [`RagError::DimensionMismatch`] if its length differs from the
    /// established dimension. The store is unchanged on error.
    pub async fn insert(
        &self,
        text: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        if embedding.is_empty() {
            return Err(RagError::ValidationError("embedding cannot be empty".to_string()));
        }
        let mut corpus = self.corpus.write().await;
        let expected = corpus.expected_dimension(embedding.len());
        if embedding.len() != expected {
            return Err(RagError::DimensionMismatch { expected, actual: embedding.len() });
        }
        corpus.push(text.into(), embedding, metadata.unwrap_or_default());
        Ok(())
    }

    /// Embed `texts` through the provider and append all rows.
    ///
    /// Either every row is appended or none is: validation happens before the
    /// provider is called, and embeddings are checked against the store's
    /// dimension under the write lock before anything is appended.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ValidationError`] if `texts` is empty or
    /// `metadata` has a different length, [`RagError::DimensionMismatch`] if
    /// the provider's vectors disagree with the store, and any provider error
    /// unchanged.
    pub async fn add_documents(
        &self,
        texts: Vec<String>,
        metadata: Option<Vec<Metadata>>,
    ) -> Result<()> {
        validate_bulk(&texts, metadata.as_deref())?;

        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_many(&refs).await?;
        if embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingError {
                provider: self.embedder.provider().name().to_string(),
                message: format!(
                    "received {} embeddings for {} texts",
                    embeddings.len(),
                    texts.len()
                ),
            });
        }

        if embeddings.iter().any(Vec::is_empty) {
            return Err(RagError::EmbeddingError {
                provider: self.embedder.provider().name().to_string(),
                message: "provider returned an empty embedding".to_string(),
            });
        }

        let mut corpus = self.corpus.write().await;
        let expected = corpus.expected_dimension(embeddings[0].len());
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(RagError::DimensionMismatch { expected, actual: bad.len() });
        }

        let count = texts.len();
        let metadata = metadata.unwrap_or_else(|| vec![Metadata::new(); count]);
        for ((text, embedding), meta) in texts.into_iter().zip(embeddings).zip(metadata) {
            corpus.push(text, embedding, meta);
        }

        info!(added = count, total = corpus.len(), dimension = expected, "added documents");
        Ok(())
    }

    /// Bulk-insert `texts` and return the store for chaining.
    ///
    /// Same validation and all-or-nothing behaviour as
    /// [`add_documents`](InMemoryVectorStore::add_documents).
    pub async fn build_from_list(
        self,
        texts: Vec<String>,
        metadata: Option<Vec<Metadata>>,
    ) -> Result<Self> {
        self.add_documents(texts, metadata).await?;
        Ok(self)
    }

    /// Embed `query` and return up to `top_k` results by descending score.
    ///
    /// An empty store returns an empty `Vec` without calling the provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ValidationError`] for an empty query or a zero-norm
    /// vector under cosine scoring, [`RagError::DimensionMismatch`] if the
    /// query embedding has the wrong length, and any provider error unchanged.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        method: SimilarityMethod,
    ) -> Result<Vec<SearchResult>> {
        if self.is_empty().await {
            debug!("search on empty store");
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed_one(query).await?;
        self.search_by_embedding(&query_embedding, top_k, method).await
    }

    /// Rank stored rows against a precomputed query embedding.
    ///
    /// `top_k` is clamped to the corpus size. Ties keep insertion order.
    pub async fn search_by_embedding(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        method: SimilarityMethod,
    ) -> Result<Vec<SearchResult>> {
        let corpus = self.corpus.read().await;
        let Some(dimension) = corpus.dimension else {
            return Ok(Vec::new());
        };
        if query_embedding.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: query_embedding.len(),
            });
        }

        let scores = method.score_batch(query_embedding, corpus.rows(dimension))?;

        let mut order: Vec<usize> = (0..scores.len()).collect();
        // `sort_by` is stable, so equal scores stay in insertion order.
        order.sort_by(|&a, &b| descending(scores[a], scores[b]));
        order.truncate(top_k.min(corpus.len()));

        let results: Vec<SearchResult> = order
            .into_iter()
            .map(|i| {
                let mut metadata = corpus.metadata[i].clone();
                metadata.insert(
                    SIMILARITY_METHOD.to_string(),
                    MetadataValue::from(method.as_str()),
                );
                SearchResult { text: corpus.texts[i].clone(), score: scores[i] + 0.0, metadata }
            })
            .collect();

        debug!(method = %method, top_k, result_count = results.len(), "search completed");
        Ok(results)
    }

    /// Current statistics.
    pub async fn stats(&self) -> StoreStats {
        let corpus = self.corpus.read().await;
        match corpus.dimension {
            Some(dimension) if corpus.len() > 0 => {
                let bytes = corpus.len() * dimension * std::mem::size_of::<f32>();
                StoreStats {
                    num_documents: corpus.len(),
                    embedding_dimension: Some(dimension),
                    total_size_mb: round2(bytes as f64 / BYTES_PER_MEGABYTE),
                }
            }
            _ => StoreStats { num_documents: 0, embedding_dimension: None, total_size_mb: 0.0 },
        }
    }

    /// Remove every row and forget the embedding dimension.
    pub async fn clear(&self) {
        let mut corpus = self.corpus.write().await;
        let removed = corpus.len();
        *corpus = Corpus::default();
        info!(removed, "cleared vector store");
    }
}

fn validate_bulk(texts: &[String], metadata: Option<&[Metadata]>) -> Result<()> {
    if texts.is_empty() {
        return Err(RagError::ValidationError("documents list cannot be empty".to_string()));
    }
    if let Some(metadata) = metadata {
        if metadata.len() != texts.len() {
            return Err(RagError::ValidationError(format!(
                "metadata length ({}) must match documents length ({})",
                metadata.len(),
                texts.len()
            )));
        }
    }
    Ok(())
}

/// Descending score order. `0.0` and `-0.0` compare equal; NaN sorts last.
fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
