//! HTTP error responses.
//!
//! Validation failures are answered synchronously as JSON, before any SSE
//! bytes are written.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Body shown for any unexpected failure. Details stay in the log.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

#[derive(Debug, Error)]
pub enum HttpError {
    /// Request body exceeded the size cap.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Malformed JSON or missing draft fields.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Carries the detail for logging only; clients get a generic message.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(detail) => {
                tracing::error!(%detail, "Internal error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}
