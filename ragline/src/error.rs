//! Error types for the `ragline` crate.

use thiserror::Error;

/// Errors that can occur in retrieval operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid construction parameters or an unknown option value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Empty or mismatched-length input. The caller may retry with corrected input.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A vector's length disagrees with the store's established dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension established by the first insertion.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// An error reported by the embedding provider (network, auth, rate limit).
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A document could not be loaded.
    #[error("Loader error ({path}): {message}")]
    LoaderError {
        /// The file, directory or URL that failed to load.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Returns `true` for errors caused by caller input rather than by a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::ValidationError(_) | Self::DimensionMismatch { .. }
        )
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
