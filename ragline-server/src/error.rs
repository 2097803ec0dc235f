//! Mapping from library errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ragline::RagError;
use serde_json::json;
use tracing::{error, warn};

/// A handler error rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(pub RagError);

impl ApiError {
    /// 400 for bad input, 502 when the embedding provider fails, 500 otherwise.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            RagError::EmbeddingError { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self.0, "request failed");
        } else {
            warn!(%status, error = %self.0, "rejected request");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
