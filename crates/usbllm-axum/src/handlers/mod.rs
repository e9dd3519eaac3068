//! HTTP request handlers.
//!
//! Status handlers are read-only views over the configuration and the
//! supervisor. The draft handler validates synchronously and then hands the
//! request to [`crate::mode`].

pub mod health;
pub mod home;
pub mod models;
pub mod stream;

use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Fallback for unknown paths.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
