//! Error taxonomy for the gallery storage subsystem
//!
//! Validation failures carry the complete list of violations so callers
//! can report everything at once. Store-layer failures keep the layer
//! they came from (blob vs. row) so batch operations can report them
//! per item.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalleryError {
    /// Client-correctable input problem. Never retried automatically.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Blob-layer failure during an upload pipeline.
    #[error("upload failed: {0}")]
    Upload(String),

    /// Blob store transport/permission failure.
    #[error("blob store error: {0}")]
    Store(String),

    /// Row store insert/update/delete/query failure.
    #[error("row store error: {0}")]
    RowStore(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl GalleryError {
    /// Single-message validation error helper.
    pub fn validation(msg: impl Into<String>) -> Self {
        GalleryError::Validation(vec![msg.into()])
    }
}

impl actix_web::ResponseError for GalleryError {
    fn status_code(&self) -> StatusCode {
        match self {
            GalleryError::Validation(_) => StatusCode::BAD_REQUEST,
            GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
            GalleryError::Upload(_)
            | GalleryError::Store(_)
            | GalleryError::RowStore(_)
            | GalleryError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            GalleryError::Validation(errors) => json!({
                "error": "validation_failed",
                "details": errors,
            }),
            other => json!({
                "error": other.to_string(),
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Convenience alias used across the services.
pub type GalleryResult<T> = Result<T, GalleryError>;
