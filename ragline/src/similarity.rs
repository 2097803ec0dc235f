//! Similarity scoring between a query vector and stored vectors.
//!
//! Two measures are supported, selected by [`SimilarityMethod`]:
//!
//! - **Cosine**: `(q · v) / (‖q‖ · ‖v‖)`. Ignores magnitude. A zero-norm
//!   vector on either side is rejected with [`RagError::ValidationError`]
//!   instead of producing `NaN`.
//! - **Euclidean**: `1 / (1 + ‖q − v‖)`. Identical vectors score `1.0`; the
//!   score decreases with distance and never reaches `0.0`.
//!
//! All functions are pure and return scores in input row order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// The scorer used to rank search results.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMethod {
    /// Angle-based similarity, insensitive to magnitude.
    #[default]
    Cosine,
    /// Distance-based similarity, sensitive to magnitude.
    Euclidean,
}

impl SimilarityMethod {
    /// All supported methods.
    pub const ALL: [SimilarityMethod; 2] = [Self::Cosine, Self::Euclidean];

    /// The lowercase name used in metadata and request payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
        }
    }

    /// Score `query` against every row, in row order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if a row's length differs from
    /// the query's, and [`RagError::ValidationError`] for a zero-norm vector
    /// under [`SimilarityMethod::Cosine`].
    pub fn score_batch<'a, I>(&self, query: &[f32], rows: I) -> Result<Vec<f32>>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        match self {
            Self::Cosine => cosine_similarity_batch(query, rows),
            Self::Euclidean => euclidean_similarity_batch(query, rows),
        }
    }
}

impl fmt::Display for SimilarityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimilarityMethod {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            other => Err(RagError::ConfigError(format!(
                "unknown similarity method '{other}' (expected 'cosine' or 'euclidean')"
            ))),
        }
    }
}

fn check_len(query: &[f32], row: &[f32]) -> Result<()> {
    if query.len() != row.len() {
        return Err(RagError::DimensionMismatch { expected: query.len(), actual: row.len() });
    }
    Ok(())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn nonzero_norm(v: &[f32], what: impl FnOnce() -> String) -> Result<f32> {
    let norm = l2_norm(v);
    if norm == 0.0 {
        return Err(RagError::ValidationError(format!(
            "cosine similarity is undefined for a zero-norm {}",
            what()
        )));
    }
    Ok(norm)
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    check_len(a, b)?;
    let norm_a = nonzero_norm(a, || "vector".to_string())?;
    let norm_b = nonzero_norm(b, || "vector".to_string())?;
    Ok(dot(a, b) / (norm_a * norm_b))
}

/// Euclidean (L2) distance between two vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    check_len(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt())
}

/// Euclidean distance mapped into `(0, 1]` as `1 / (1 + distance)`.
pub fn euclidean_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    Ok(1.0 / (1.0 + euclidean_distance(a, b)?))
}

/// Cosine similarity between `query` and each row.
///
/// The query norm is computed once.
pub fn cosine_similarity_batch<'a, I>(query: &[f32], rows: I) -> Result<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let query_norm = nonzero_norm(query, || "query vector".to_string())?;
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            check_len(query, row)?;
            let row_norm = nonzero_norm(row, || format!("stored vector at row {i}"))?;
            Ok(dot(query, row) / (query_norm * row_norm))
        })
        .collect()
}

/// Euclidean distance between `query` and each row.
pub fn euclidean_distance_batch<'a, I>(query: &[f32], rows: I) -> Result<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    rows.into_iter().map(|row| euclidean_distance(query, row)).collect()
}

/// Euclidean similarity between `query` and each row.
pub fn euclidean_similarity_batch<'a, I>(query: &[f32], rows: I) -> Result<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    Ok(euclidean_distance_batch(query, rows)?.into_iter().map(|d| 1.0 / (1.0 + d)).collect())
}
