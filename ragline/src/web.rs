//! Web article loading.
//!
//! This module is only available when the `web` feature is enabled.
//!
//! [`WebArticleLoader`] fetches a page and reduces it to its readable text:
//! headings, paragraphs, list items and quotes under the page's `article`,
//! `main` or `body` element, with scripts, styles and navigation skipped.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::{Metadata, MetadataValue, SOURCE_TYPE, SourceType};
use crate::error::{RagError, Result};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; ragline/0.1)";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const UNKNOWN_TITLE: &str = "Unknown Title";
const BLOCK_TAGS: [&str; 9] = ["h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "blockquote"];
const SKIPPED_TAGS: [&str; 6] = ["script", "style", "template", "noscript", "nav", "footer"];

/// The list of article URLs to ingest, read from a JSON file `{"urls": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebSources {
    /// URLs to fetch, in order.
    #[serde(default)]
    pub urls: Vec<String>,
}

impl WebSources {
    /// Read sources from a JSON file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| RagError::LoaderError {
            path: path.display().to_string(),
            message: format!("cannot read web sources: {e}"),
        })?;
        serde_json::from_str(&raw).map_err(|e| RagError::LoaderError {
            path: path.display().to_string(),
            message: format!("invalid web sources file: {e}"),
        })
    }
}

/// A fetched article: `# {title}\n\n{content}` plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct WebDocument {
    /// The article text, prefixed with its title as a heading.
    pub text: String,
    /// `source_url`, `title`, `fetch_date`, `source_type` and any of
    /// `author`, `site_name`, `publish_date` found on the page.
    pub metadata: Metadata,
}

/// Fetches URLs and extracts article text.
#[derive(Debug, Clone)]
pub struct WebArticleLoader {
    client: reqwest::Client,
}

impl WebArticleLoader {
    /// Create a loader with a 10 second timeout and the default user agent.
    pub fn new() -> Result<Self> {
        Self::with_options(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Create a loader with a custom timeout and user agent.
    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetch and extract one article.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoaderError`] if the request fails, the server
    /// responds with an error status, or no article text can be extracted.
    pub async fn load_url(&self, url: &str) -> Result<WebDocument> {
        let loader_error = |message: String| RagError::LoaderError { path: url.to_string(), message };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| loader_error(format!("failed to fetch: {e}")))?;
        let html = response.text().await.map_err(|e| loader_error(format!("failed to read body: {e}")))?;

        let mut document = extract_article(&html, url)?;
        document
            .metadata
            .insert("fetch_date".to_string(), MetadataValue::from(Utc::now().to_rfc3339()));
        Ok(document)
    }

    /// Load each URL in order. Failing URLs are logged and skipped.
    pub async fn load_urls(&self, urls: &[String]) -> Vec<WebDocument> {
        let mut documents = Vec::with_capacity(urls.len());
        for url in urls {
            match self.load_url(url).await {
                Ok(doc) => {
                    let title = doc.metadata.get("title").map(ToString::to_string);
                    info!(url = %url, title = title.as_deref().unwrap_or(UNKNOWN_TITLE), "loaded web article");
                    documents.push(doc);
                }
                Err(e) => warn!(url = %url, error = %e, "skipping web article"),
            }
        }
        documents
    }
}

/// Extract an article from raw HTML. `fetch_date` is added by the caller.
///
/// # Errors
///
/// Returns [`RagError::LoaderError`] if the page has no readable text.
pub fn extract_article(html: &str, url: &str) -> Result<WebDocument> {
    let page = Html::parse_document(html);
    let content = extract_content(&page);
    if content.is_empty() {
        return Err(RagError::LoaderError {
            path: url.to_string(),
            message: "failed to extract content from HTML".to_string(),
        });
    }

    let title = select_text(&page, "title")
        .or_else(|| select_meta(&page, "og:title"))
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let mut metadata = Metadata::new();
    metadata.insert("source_url".to_string(), MetadataValue::from(url));
    metadata.insert("title".to_string(), MetadataValue::from(title.as_str()));
    metadata.insert(SOURCE_TYPE.to_string(), SourceType::WebArticle.into());
    for (key, meta_name) in
        [("author", "author"), ("site_name", "og:site_name"), ("publish_date", "article:published_time")]
    {
        if let Some(value) = select_meta(&page, meta_name) {
            metadata.insert(key.to_string(), MetadataValue::from(value));
        }
    }

    Ok(WebDocument { text: format!("# {title}\n\n{content}"), metadata })
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn select_text(page: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    page.select(&sel)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn select_meta(page: &Html, name: &str) -> Option<String> {
    let css = format!(r#"meta[name="{name}"], meta[property="{name}"]"#);
    let sel = selector(&css)?;
    page.select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|v| !v.is_empty())
}

fn pick_root(page: &Html) -> ElementRef<'_> {
    ["article", "main", "body"]
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| page.select(&sel).next())
        .unwrap_or_else(|| page.root_element())
}

fn extract_content(page: &Html) -> String {
    let root = pick_root(page);
    let mut blocks: Vec<String> = Vec::new();
    for element in root.descendent_elements() {
        if !BLOCK_TAGS.contains(&element.value().name()) || is_nested_or_hidden(element) {
            continue;
        }
        let text = collapse_whitespace(&element.text().collect::<String>());
        if !text.is_empty() {
            blocks.push(text);
        }
    }
    blocks.join("\n\n")
}

/// A block inside another block is already covered by its parent's text.
fn is_nested_or_hidden(element: ElementRef<'_>) -> bool {
    element.ancestors().filter_map(ElementRef::wrap).any(|ancestor| {
        let name = ancestor.value().name();
        SKIPPED_TAGS.contains(&name) || BLOCK_TAGS.contains(&name)
    })
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
