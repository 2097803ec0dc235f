//! # ragline
//!
//! In-memory retrieval engine for retrieval-augmented generation.
//!
//! ## Overview
//!
//! Documents are split by a [`FixedSizeChunker`] into overlapping character
//! windows, embedded through an [`EmbeddingProvider`], and stored in an
//! [`InMemoryVectorStore`]. At query time the store embeds the query and ranks
//! every stored chunk with the chosen [`SimilarityMethod`].
//!
//! - [`chunking`]: fixed-size overlapping splitter
//! - [`similarity`]: cosine and Euclidean batch scoring
//! - [`inmemory`]: the vector store
//! - [`embedding`]: provider trait and the batching [`EmbeddingClient`]
//! - [`loader`], [`web`], [`ingest`]: document loading and ingestion
//! - [`usage`]: retrieval usage statistics
//! - [`prompt`]: `[Source N]` prompt assembly and citation checks
//!
//! ## Features
//!
//! - `openai` (default): [`openai::OpenAIEmbeddingProvider`]
//! - `pdf` (default): PDF text extraction in [`DocumentLoader`]
//! - `web` (default): [`web::WebArticleLoader`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragline::{InMemoryVectorStore, SimilarityMethod};
//!
//! let store = InMemoryVectorStore::with_provider(Arc::new(my_provider));
//! store.add_documents(vec!["Relax before the dive.".into()], None).await?;
//! let results = store.search("relaxation", 3, SimilarityMethod::Cosine).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod inmemory;
pub mod loader;
pub mod prompt;
pub mod similarity;
pub mod usage;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "web")]
pub mod web;

pub use chunking::{Chunker, FixedSizeChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Metadata, MetadataValue, SearchResult, SourceType};
pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use error::{RagError, Result};
pub use ingest::{IngestReport, IngestSources, Ingestor};
pub use inmemory::{InMemoryVectorStore, StoreStats};
pub use loader::{DocumentLoader, LoadedDocument};
pub use prompt::{PromptOptions, PromptTemplate, RagPrompt};
pub use similarity::SimilarityMethod;
pub use usage::{UsageReport, UsageTracker};
