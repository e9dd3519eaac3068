//! Local llama-server process management.
//!
//! # Structure
//!
//! - `ports` - `find_free_port` linear scan over loopback ports
//! - `readiness` - `wait_for_ready` TCP accept polling
//! - `shutdown` - SIGTERM → SIGKILL escalation for a `tokio::process::Child`
//! - `supervisor` - `ProcessSupervisor`, the single-instance lifecycle owner
//! - `types` - `StartRequest`, `ServerInfo`, `SupervisorConfig`

mod ports;
mod readiness;
pub mod shutdown;
mod supervisor;
mod types;

/// The only interface the launcher and its subprocess ever bind to.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

pub use ports::{DEFAULT_BASE_PORT, DEFAULT_PORT_ATTEMPTS, PortError, find_free_port, is_port_available};
pub use readiness::{READY_POLL_INTERVAL, ReadinessError, wait_for_ready, wait_for_ready_every};
pub use shutdown::shutdown_child;
pub use supervisor::{ProcessSupervisor, SupervisorError, SupervisorStatus};
pub use types::{ServerInfo, StartRequest, SupervisorConfig};
