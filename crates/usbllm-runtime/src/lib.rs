//! Process supervision and upstream stream relay for the usb-llm launcher.
//!
//! This crate owns every OS- and network-level concern of the launcher:
//!
//! - [`process`] - port probing, readiness polling, graceful shutdown, and the
//!   single-instance [`ProcessSupervisor`] for a local llama-server
//! - [`relay`] - the [`StreamRelay`] that turns an upstream chat-completion
//!   SSE body into [`usbllm_core::RelayEvent`]s
#![deny(unsafe_code)]

pub mod process;
pub mod relay;

pub use process::{
    LOOPBACK_HOST, PortError, ProcessSupervisor, ReadinessError, ServerInfo, StartRequest,
    SupervisorConfig, SupervisorError, SupervisorStatus, find_free_port, wait_for_ready,
};
pub use relay::{RelayError, RelayStream, StreamRelay};
