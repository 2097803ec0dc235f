//! Data types for chunk metadata and search results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata key holding the originating file name.
pub const FILENAME: &str = "filename";
/// Metadata key holding the originating path.
pub const SOURCE: &str = "source";
/// Metadata key holding the chunk's position within its parent document.
pub const CHUNK_INDEX: &str = "chunk_index";
/// Metadata key holding the number of chunks the parent document produced.
pub const TOTAL_CHUNKS: &str = "total_chunks";
/// Metadata key holding the [`SourceType`] of the parent document.
pub const SOURCE_TYPE: &str = "source_type";
/// Metadata key added to search results, naming the scorer that produced the score.
pub const SIMILARITY_METHOD: &str = "similarity_method";

/// A single metadata value.
///
/// Metadata is deliberately flat: strings, integers, floats and booleans only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A boolean flag.
    Bool(bool),
    /// An integer, such as a chunk index.
    Integer(i64),
    /// A floating-point number.
    Float(f64),
    /// A string, such as a file name or URL.
    String(String),
}

impl MetadataValue {
    /// Return the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the integer value, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Key-value metadata attached to a stored chunk.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Where a chunk's parent document came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// A `.txt` or `.pdf` file on local disk.
    LocalFile,
    /// An article fetched from the web.
    WebArticle,
}

impl SourceType {
    /// The metadata string for this source type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalFile => "local_file",
            Self::WebArticle => "web_article",
        }
    }
}

impl From<SourceType> for MetadataValue {
    fn from(value: SourceType) -> Self {
        Self::String(value.as_str().to_string())
    }
}

/// A retrieved chunk paired with a relevance score.
///
/// `metadata` is a copy of the stored metadata plus a
/// [`SIMILARITY_METHOD`] entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The chunk text.
    pub text: String,
    /// The similarity score (higher is more relevant).
    pub score: f32,
    /// Stored metadata plus the scorer that produced `score`.
    pub metadata: Metadata,
}
