//! Ingestion: load local files and web articles, chunk them, and fill the store.
//!
//! Every chunk produced by one [`Ingestor::ingest`] call is added with a
//! single [`InMemoryVectorStore::add_documents`] call, so ingestion either
//! lands completely or leaves the store as it was.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{
    CHUNK_INDEX, FILENAME, Metadata, MetadataValue, SOURCE, SOURCE_TYPE, SourceType, TOTAL_CHUNKS,
};
use crate::error::Result;
use crate::inmemory::{InMemoryVectorStore, StoreStats};
use crate::loader::{DocumentLoader, LoadedDocument};

/// Where to find documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestSources {
    /// Directory of `.txt`/`.pdf` files.
    pub data_dir: PathBuf,
    /// Optional JSON file listing web article URLs.
    pub web_sources: Option<PathBuf>,
}

impl IngestSources {
    /// Local files only.
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), web_sources: None }
    }

    /// Add a web sources file.
    pub fn with_web_sources(mut self, path: impl Into<PathBuf>) -> Self {
        self.web_sources = Some(path.into());
        self
    }
}

/// What an ingestion run added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    /// Local files loaded.
    pub local_documents: usize,
    /// Chunks produced from local files.
    pub local_chunks: usize,
    /// Web articles loaded.
    pub web_documents: usize,
    /// Chunks produced from web articles.
    pub web_chunks: usize,
    /// Store statistics after the run.
    pub stats: StoreStats,
}

impl IngestReport {
    /// Total chunks added by the run.
    pub fn total_chunks(&self) -> usize {
        self.local_chunks + self.web_chunks
    }
}

/// Chunks and metadata ready to be embedded.
#[derive(Debug, Default)]
struct Batch {
    texts: Vec<String>,
    metadata: Vec<Metadata>,
}

impl Batch {
    fn len(&self) -> usize {
        self.texts.len()
    }

    fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    fn extend(&mut self, other: Batch) {
        self.texts.extend(other.texts);
        self.metadata.extend(other.metadata);
    }
}

/// Loads sources, chunks them and adds the chunks to a store.
#[derive(Debug, Clone)]
pub struct Ingestor {
    chunker: FixedSizeChunker,
    sources: IngestSources,
}

impl Ingestor {
    /// Create an ingestor with the chunking fields of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) for invalid chunking parameters.
    pub fn new(config: &RagConfig, sources: IngestSources) -> Result<Self> {
        Ok(Self { chunker: FixedSizeChunker::from_config(config)?, sources })
    }

    /// The configured sources.
    pub fn sources(&self) -> &IngestSources {
        &self.sources
    }

    /// Load and chunk every source, then add all chunks to `store` at once.
    ///
    /// Whitespace-only chunks are skipped; `chunk_index` keeps the chunker's
    /// numbering. A web source failure downgrades to local documents only. When there is
    /// nothing to add the provider is not called.
    ///
    /// # Errors
    ///
    /// Returns loader errors for the data directory and any error from
    /// [`InMemoryVectorStore::add_documents`].
    pub async fn ingest(&self, store: &InMemoryVectorStore) -> Result<IngestReport> {
        let documents = DocumentLoader::new(&self.sources.data_dir).load().await?;
        let local_documents = documents.len();
        let local = self.chunk_local(&documents);
        info!(
            data_dir = %self.sources.data_dir.display(),
            documents = local_documents,
            chunks = local.len(),
            "chunked local documents"
        );

        let (web_documents, web) = self.load_web().await;
        let local_chunks = local.len();
        let web_chunks = web.len();

        let mut batch = local;
        batch.extend(web);

        if batch.is_empty() {
            warn!("no documents found to ingest");
        } else {
            store.add_documents(batch.texts, Some(batch.metadata)).await?;
        }

        let stats = store.stats().await;
        info!(local_chunks, web_chunks, total = stats.num_documents, "ingestion complete");
        Ok(IngestReport { local_documents, local_chunks, web_documents, web_chunks, stats })
    }

    /// Clear the store and ingest again.
    pub async fn reload(&self, store: &InMemoryVectorStore) -> Result<IngestReport> {
        store.clear().await;
        self.ingest(store).await
    }

    fn chunk_local(&self, documents: &[LoadedDocument]) -> Batch {
        let mut batch = Batch::default();
        for document in documents {
            for (index, chunk) in self.chunker.split(&document.text).into_iter().enumerate() {
                if chunk.trim().is_empty() {
                    continue;
                }
                let mut metadata = Metadata::new();
                metadata.insert(FILENAME.to_string(), MetadataValue::from(document.filename.as_str()));
                metadata.insert(
                    SOURCE.to_string(),
                    MetadataValue::from(document.path.display().to_string()),
                );
                metadata.insert(CHUNK_INDEX.to_string(), MetadataValue::from(index));
                metadata.insert(SOURCE_TYPE.to_string(), SourceType::LocalFile.into());
                batch.texts.push(chunk);
                batch.metadata.push(metadata);
            }
        }
        batch
    }

    #[cfg(feature = "web")]
    async fn load_web(&self) -> (usize, Batch) {
        use crate::web::{WebArticleLoader, WebSources};

        let Some(path) = &self.sources.web_sources else {
            return (0, Batch::default());
        };
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            info!(path = %path.display(), "no web sources config found");
            return (0, Batch::default());
        }

        let sources = match WebSources::from_file(path).await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "could not load web sources, continuing with local documents only");
                return (0, Batch::default());
            }
        };
        if sources.urls.is_empty() {
            info!(path = %path.display(), "no URLs configured");
            return (0, Batch::default());
        }

        let loader = match WebArticleLoader::new() {
            Ok(loader) => loader,
            Err(e) => {
                warn!(error = %e, "could not build web loader, continuing with local documents only");
                return (0, Batch::default());
            }
        };
        let articles = loader.load_urls(&sources.urls).await;
        let batch = self.chunk_web(articles.iter().map(|a| (a.text.as_str(), &a.metadata)));
        info!(articles = articles.len(), chunks = batch.len(), "chunked web articles");
        (articles.len(), batch)
    }

    #[cfg(not(feature = "web"))]
    async fn load_web(&self) -> (usize, Batch) {
        if self.sources.web_sources.is_some() {
            warn!("web sources configured but the `web` feature is disabled");
        }
        (0, Batch::default())
    }

    #[cfg_attr(not(feature = "web"), allow(dead_code))]
    fn chunk_web<'a, I>(&self, articles: I) -> Batch
    where
        I: IntoIterator<Item = (&'a str, &'a Metadata)>,
    {
        let mut batch = Batch::default();
        for (text, article_metadata) in articles {
            let chunks = self.chunker.split(text);
            let total = chunks.len();
            for (index, chunk) in chunks.into_iter().enumerate() {
                if chunk.trim().is_empty() {
                    continue;
                }
                let mut metadata = article_metadata.clone();
                metadata.insert(CHUNK_INDEX.to_string(), MetadataValue::from(index));
                metadata.insert(TOTAL_CHUNKS.to_string(), MetadataValue::from(total));
                batch.texts.push(chunk);
                batch.metadata.push(metadata);
            }
        }
        batch
    }
}
