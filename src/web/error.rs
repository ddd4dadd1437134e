//! API error type shared by all handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Handler-visible failures. All variants except `NotFound` render the
/// `{message, success: false}` envelope the API speaks everywhere else.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{resource} not found")]
    NotFound { resource: &'static str },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal_error(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
}

/// Log a persistence failure and convert it to an opaque 500.
pub fn db_error(context: &str, e: anyhow::Error) -> ApiError {
    tracing::error!(error = ?e, "{context} failed");
    ApiError::Internal(e.to_string())
}

fn envelope(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(json!({ "message": message, "success": false })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Detail misses keep the original bare shape, not the envelope.
            ApiError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("{resource} not found") })),
            )
                .into_response(),
            ApiError::Forbidden(message) => envelope(StatusCode::FORBIDDEN, message),
            ApiError::BadRequest(message) => envelope(StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => envelope(StatusCode::INTERNAL_SERVER_ERROR, message),
        }
    }
}

/// `Option -> Result` sugar for lookups that 404 on `None`.
pub trait OptionNotFoundExt<T> {
    fn or_not_found(self, resource: &'static str) -> Result<T, ApiError>;
}

impl<T> OptionNotFoundExt<T> for Option<T> {
    fn or_not_found(self, resource: &'static str) -> Result<T, ApiError> {
        self.ok_or(ApiError::NotFound { resource })
    }
}
