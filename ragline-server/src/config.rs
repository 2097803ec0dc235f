//! Server configuration read from the environment.

use std::path::PathBuf;

use anyhow::{Context, bail};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_WEB_SOURCES: &str = "config/web_sources.json";
const DEFAULT_TOP_K: usize = 3;
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Settings for [`run_server`](crate::run_server).
///
/// `Debug` leaves out the API key.
#[derive(Clone)]
pub struct ServerConfig {
    /// Interface to bind (`RAGLINE_HOST`, default `127.0.0.1`).
    pub host: String,
    /// Port to bind (`RAGLINE_PORT`, default `8000`).
    pub port: u16,
    /// Directory of `.txt`/`.pdf` documents ingested at startup.
    pub data_dir: PathBuf,
    /// JSON file listing web article URLs. Missing is fine.
    pub web_sources: PathBuf,
    /// Results returned when a search request does not set `top_k`.
    pub top_k: usize,
    /// Key for the OpenAI embeddings API (`OPENAI_API_KEY`). The server refuses to start without it.
    pub openai_api_key: Option<String>,
    /// Embedding model name (`RAGLINE_EMBEDDING_MODEL`, default `text-embedding-3-small`).
    pub embedding_model: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("web_sources", &self.web_sources)
            .field("top_k", &self.top_k)
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            web_sources: PathBuf::from(DEFAULT_WEB_SOURCES),
            top_k: DEFAULT_TOP_K,
            openai_api_key: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Read `RAGLINE_*` variables and `OPENAI_API_KEY` from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Unset and blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("RAGLINE_PORT") {
            Some(raw) => raw.parse::<u16>().with_context(|| format!("invalid RAGLINE_PORT '{raw}'"))?,
            None => defaults.port,
        };
        let top_k = match get("RAGLINE_TOP_K") {
            Some(raw) => {
                raw.parse::<usize>().with_context(|| format!("invalid RAGLINE_TOP_K '{raw}'"))?
            }
            None => defaults.top_k,
        };
        if top_k == 0 {
            bail!("RAGLINE_TOP_K must be greater than zero");
        }

        Ok(Self {
            host: get("RAGLINE_HOST").unwrap_or(defaults.host),
            port,
            data_dir: get("RAGLINE_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            web_sources: get("RAGLINE_WEB_SOURCES")
                .map(PathBuf::from)
                .unwrap_or(defaults.web_sources),
            top_k,
            openai_api_key: get("OPENAI_API_KEY"),
            embedding_model: get("RAGLINE_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
        })
    }
}
