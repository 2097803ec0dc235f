//! Local document loading for `.txt` and `.pdf` files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// File extensions the loader understands.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "pdf"];

/// Raw text of one local file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    /// The full document text.
    pub text: String,
    /// The file name without its directory.
    pub filename: String,
    /// The path the document was read from.
    pub path: PathBuf,
}

/// Loads a single file or every supported file directly inside a directory.
///
/// Text files are read as UTF-8. PDF files are read page by page with the
/// page texts joined by `\n`; this requires the `pdf` feature.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    path: PathBuf,
}

impl DocumentLoader {
    /// Create a loader for `path`, which may be a file or a directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this loader reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file, or every supported file in the directory sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoaderError`] if the path does not exist, a file has
    /// an unsupported extension, or a file cannot be read.
    pub async fn load(&self) -> Result<Vec<LoadedDocument>> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| RagError::LoaderError {
            path: self.path.display().to_string(),
            message: format!("path does not exist or is not accessible: {e}"),
        })?;

        if metadata.is_dir() {
            return self.load_directory().await;
        }
        if !is_supported(&self.path) {
            return Err(RagError::LoaderError {
                path: self.path.display().to_string(),
                message: "not a supported file type (.txt or .pdf)".to_string(),
            });
        }
        Ok(vec![load_file(&self.path).await?])
    }

    /// Paths of the supported files directly inside the directory, sorted by name.
    pub async fn list_supported_files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.path).await.map_err(|e| {
            RagError::LoaderError {
                path: self.path.display().to_string(),
                message: format!("cannot read directory: {e}"),
            }
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_supported(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn load_directory(&self) -> Result<Vec<LoadedDocument>> {
        let files = self.list_supported_files().await?;
        debug!(directory = %self.path.display(), file_count = files.len(), "loading directory");
        let mut documents = Vec::with_capacity(files.len());
        for file in &files {
            documents.push(load_file(file).await?);
        }
        Ok(documents)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase)
}

fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

async fn load_file(path: &Path) -> Result<LoadedDocument> {
    let text = match extension(path).as_deref() {
        Some("pdf") => load_pdf(path).await?,
        _ => tokio::fs::read_to_string(path).await.map_err(|e| RagError::LoaderError {
            path: path.display().to_string(),
            message: format!("cannot read text file: {e}"),
        })?,
    };
    if text.is_empty() {
        warn!(path = %path.display(), "loaded document is empty");
    }
    let filename =
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    Ok(LoadedDocument { text, filename, path: path.to_path_buf() })
}

#[cfg(feature = "pdf")]
async fn load_pdf(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let display = path.display().to_string();
    let pages = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .await
        .map_err(|e| RagError::LoaderError {
            path: display.clone(),
            message: format!("pdf extraction task failed: {e}"),
        })?
        .map_err(|e| RagError::LoaderError {
            path: display,
            message: format!("cannot extract pdf text: {e}"),
        })?;
    Ok(pages.join("\n"))
}

#[cfg(not(feature = "pdf"))]
async fn load_pdf(path: &Path) -> Result<String> {
    Err(RagError::LoaderError {
        path: path.display().to_string(),
        message: "pdf support is not enabled (build with the `pdf` feature)".to_string(),
    })
}
