//! Router, shared state and handlers.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use ragline::openai::OpenAIEmbeddingProvider;
use ragline::prompt::build_rag_prompt;
use ragline::{
    IngestReport, IngestSources, Ingestor, InMemoryVectorStore, PromptOptions, PromptTemplate,
    RagConfig, RagError, RagPrompt, SearchResult, SimilarityMethod, StoreStats, UsageReport, UsageTracker,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{config::ServerConfig, error::ApiError};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The single vector store searched by every request.
    pub store: Arc<InMemoryVectorStore>,
    /// Loads the configured sources into `store`.
    pub ingestor: Arc<Ingestor>,
    /// Counters behind `GET /api/rag-stats`.
    pub usage: Arc<UsageTracker>,
    /// Set once an ingestion run has finished; cleared while one is running.
    pub ingestion_complete: Arc<AtomicBool>,
    /// `top_k` for search requests that omit it, and for chat retrieval.
    pub default_top_k: usize,
    /// Serializes reloads so two clear-then-ingest runs never interleave.
    reload_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("default_top_k", &self.default_top_k)
            .field("ingestion_complete", &self.ingestion_complete.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wrap a store and ingestor. `default_top_k` is raised to at least 1.
    pub fn new(store: InMemoryVectorStore, ingestor: Ingestor, default_top_k: usize) -> Self {
        Self {
            store: Arc::new(store),
            ingestor: Arc::new(ingestor),
            usage: Arc::new(UsageTracker::new()),
            ingestion_complete: Arc::new(AtomicBool::new(false)),
            default_top_k: default_top_k.max(1),
            reload_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Ingest every configured source into the store.
    pub async fn ingest(&self) -> ragline::Result<IngestReport> {
        let _guard = self.reload_lock.lock().await;
        self.ingestion_complete.store(false, Ordering::SeqCst);
        let report = self.ingestor.ingest(&self.store).await?;
        self.ingestion_complete.store(true, Ordering::SeqCst);
        Ok(report)
    }

    /// Clear the store and ingest again.
    pub async fn reload(&self) -> ragline::Result<IngestReport> {
        let _guard = self.reload_lock.lock().await;
        self.ingestion_complete.store(false, Ordering::SeqCst);
        let report = self.ingestor.reload(&self.store).await?;
        self.ingestion_complete.store(true, Ordering::SeqCst);
        Ok(report)
    }
}

/// All `/api` routes with permissive CORS and request tracing.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/ingest/stats", get(ingest_stats))
        .route("/api/ingest/reload", post(reload))
        .route("/api/search", post(search))
        .route("/api/chat", post(chat))
        .route("/api/rag-stats", get(rag_stats))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the store from `config`, ingest, and serve until the process exits.
///
/// A failed startup ingestion is logged and the server starts with an empty
/// store; `POST /api/ingest/reload` can fill it later.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let api_key = config
        .openai_api_key
        .clone()
        .context("OPENAI_API_KEY must be set to embed documents and queries")?;
    let provider = OpenAIEmbeddingProvider::new(api_key)
        .context("failed to configure the OpenAI embedding provider")?
        .with_model(config.embedding_model.clone());

    let rag_config = RagConfig::builder()
        .top_k(config.top_k)
        .build()
        .context("invalid retrieval configuration")?;
    let store = InMemoryVectorStore::new(ragline::EmbeddingClient::from_config(
        Arc::new(provider),
        &rag_config,
    ));
    let sources = IngestSources::local(&config.data_dir).with_web_sources(&config.web_sources);
    let ingestor = Ingestor::new(&rag_config, sources).context("invalid chunking configuration")?;
    let state = AppState::new(store, ingestor, config.top_k);

    match state.ingest().await {
        Ok(report) => info!(
            local_documents = report.local_documents,
            web_documents = report.web_documents,
            chunks = report.total_chunks(),
            "startup ingestion complete"
        ),
        Err(e) => error!(error = %e, "startup ingestion failed, serving an empty store"),
    }

    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for ragline-server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("ragline-server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"ragline-server"}))
}

#[derive(Debug, Serialize)]
struct IngestStatsResponse {
    #[serde(flatten)]
    stats: StoreStats,
    ingestion_complete: bool,
}

async fn ingest_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(IngestStatsResponse {
        stats: state.store.stats().await,
        ingestion_complete: state.ingestion_complete.load(Ordering::SeqCst),
    })
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
}

async fn reload(
    State(state): State<AppState>,
) -> Result<Json<ReloadResponse>, (StatusCode, Json<ReloadResponse>)> {
    match state.reload().await {
        Ok(report) => Ok(Json(ReloadResponse {
            success: true,
            message: format!(
                "Reloaded {} chunks from {} local documents and {} web articles",
                report.total_chunks(),
                report.local_documents,
                report.web_documents
            ),
        })),
        Err(e) => {
            error!(error = %e, "reload failed");
            let message = format!("Reload failed: {e}");
            let status = ApiError(e).status();
            Err((status, Json(ReloadResponse { success: false, message })))
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    similarity_method: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(RagError::ValidationError("query cannot be empty".to_string()).into());
    }
    let method = match request.similarity_method.as_deref() {
        Some(raw) => raw.parse::<SimilarityMethod>()?,
        None => SimilarityMethod::default(),
    };
    let top_k = request.top_k.unwrap_or(state.default_top_k);

    let results = state.store.search(&request.query, top_k, method).await?;
    state.usage.record(&results, method);
    Ok(Json(SearchResponse { results }))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    user_message: String,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    similarity_method: Option<String>,
}

/// Retrieve context for `user_message` and return the prompt a chat model
/// would be sent. Generating the answer is up to the client.
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<RagPrompt>, ApiError> {
    if request.user_message.trim().is_empty() {
        return Err(RagError::ValidationError("user_message cannot be empty".to_string()).into());
    }
    let template = match request.template.as_deref() {
        Some(raw) => raw.parse::<PromptTemplate>()?,
        None => PromptTemplate::default(),
    };
    let method = match request.similarity_method.as_deref() {
        Some(raw) => raw.parse::<SimilarityMethod>()?,
        None => SimilarityMethod::default(),
    };

    let results = state.store.search(&request.user_message, state.default_top_k, method).await?;
    state.usage.record(&results, method);
    let prompt =
        build_rag_prompt(&request.user_message, &results, template, &PromptOptions::default());
    Ok(Json(prompt))
}

async fn rag_stats(State(state): State<AppState>) -> Json<UsageReport> {
    Json(state.usage.snapshot(state.store.stats().await))
}
