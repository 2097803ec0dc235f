//! Deterministic embedding providers for tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ragline::{EmbeddingProvider, RagError, Result};

/// Bag-of-words embeddings: each lowercase word is hashed into a bucket, and
/// the last component is always 1 so no vector has zero norm.
pub struct WordHashProvider {
    pub dimensions: usize,
}

impl WordHashProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

fn bucket(word: &str, buckets: usize) -> usize {
    let hash = word.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    (hash % buckets as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for WordHashProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            embedding[bucket(&word.to_lowercase(), self.dimensions - 1)] += 1.0;
        }
        embedding[self.dimensions - 1] = 1.0;
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "word-hash"
    }
}

/// Always fails, counting how often it was called.
#[derive(Default)]
pub struct FailingProvider {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::EmbeddingError {
            provider: "failing".to_string(),
            message: "rate limited".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        4
    }
}

/// Embeds a text as `[len, 1.0]`, records every batch it receives, and
/// sleeps longer for earlier batches so they complete out of order.
#[derive(Default)]
pub struct RecordingProvider {
    pub batches: Mutex<Vec<Vec<String>>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// Fail any batch containing this text.
    pub fail_on: Option<String>,
}

impl RecordingProvider {
    pub fn failing_on(text: &str) -> Self {
        Self { fail_on: Some(text.to_string()), ..Self::default() }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for RecordingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![text.len() as f32, 1.0])
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let batch_number = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(texts.iter().map(|t| t.to_string()).collect());
            batches.len()
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(batch_number as u64 * 10)))
            .await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(fail_on) = &self.fail_on {
            if texts.contains(&fail_on.as_str()) {
                return Err(RagError::EmbeddingError {
                    provider: "recording".to_string(),
                    message: format!("cannot embed '{fail_on}'"),
                });
            }
        }
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
    }

    fn dimensions(&self) -> usize {
        2
    }
}

/// Returns vectors of a fixed length regardless of the store's dimension.
pub struct FixedDimensionProvider {
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for FixedDimensionProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![1.0f32; self.dimensions];
        v[0] += text.len() as f32;
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Embeds a text as `[len, 1.0]` after a fixed delay per text.
pub struct SlowProvider {
    pub delay: Duration,
}

#[async_trait]
impl EmbeddingProvider for SlowProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![text.len() as f32, 1.0])
    }

    fn dimensions(&self) -> usize {
        2
    }
}
