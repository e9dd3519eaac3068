//! Axum HTTP/SSE adapter for the usb-llm launcher.
//!
//! Serves the draft endpoint (`POST /api/stream`) and a few read-only status
//! routes on the loopback interface. Every draft picks one of three sources
//! per request (external upstream, supervised local llama-server, or the
//! offline stub) and is re-emitted as the same SSE frame vocabulary.
#![deny(unsafe_code)]

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod mode;
pub mod routes;
pub mod sse;
pub mod state;
pub mod stub;

pub use bootstrap::{ServerConfig, bind_with_retry, serve, shutdown_signal};
pub use error::HttpError;
pub use mode::DraftRoute;
pub use routes::create_router;
pub use state::AppState;
