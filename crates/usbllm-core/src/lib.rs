//! Domain types for the usb-llm launcher.
//!
//! This crate is pure: it has no async runtime and no HTTP stack. Adapters
//! (`usbllm-runtime`, `usbllm-axum`, `usbllm-cli`) depend on it for the
//! shared vocabulary.
//!
//! # Structure
//!
//! - [`config`] - `LauncherConfig`, loaded from `USBLLM_*` environment variables
//! - [`models`] - Model registry lookup and local model resolution
//! - [`prompt`] - Email prompt construction from flow/tone/length fields
//! - [`events`] - `RelayEvent` and the outbound SSE frame vocabulary

pub mod config;
pub mod events;
pub mod models;
pub mod prompt;

pub use config::{DEFAULT_LISTEN_PORT, DEFAULT_MODEL, DEFAULT_TEMPERATURE, LauncherConfig};
pub use events::{FrameKind, OutboundFrame, RelayEvent};
pub use models::{ModelStatus, RegistryEntry, ResolvedModel, load_registry, resolve_local_model};
pub use prompt::{
    BuiltPrompt, DraftFields, DraftPrompt, EmailPromptArgs, Flow, Length, PromptError, Tone,
    build_email_prompts,
};
