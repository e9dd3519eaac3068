//! Port allocation utilities for process management.

use std::net::TcpListener;

use thiserror::Error;
use tracing::debug;

use super::LOOPBACK_HOST;

/// First port tried when no preferred port is configured.
pub const DEFAULT_BASE_PORT: u16 = 8080;

/// Number of consecutive ports probed from the base.
pub const DEFAULT_PORT_ATTEMPTS: u16 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("No free port found in range {base}-{last}")]
    NoFreePort { base: u16, last: u16 },
}

/// Check if a port is available by attempting to bind to it.
/// This method binds and immediately drops the listener, which releases the port.
pub fn is_port_available(port: u16) -> bool {
    match TcpListener::bind((LOOPBACK_HOST, port)) {
        Ok(listener) => listener.local_addr().is_ok(),
        Err(_) => false,
    }
}

/// Return the lowest free loopback port in `base..base + max_attempts`.
///
/// Candidates are tried in ascending order. The probe socket is released
/// before returning so the caller can bind the port itself.
pub fn find_free_port(base: u16, max_attempts: u16) -> Result<u16, PortError> {
    let mut last = base;
    for offset in 0..max_attempts {
        let Some(port) = base.checked_add(offset) else {
            break;
        };
        last = port;

        if is_port_available(port) {
            debug!(port = %port, "Allocated available port");
            return Ok(port);
        }
        debug!(port = %port, "Port unavailable on system, skipping");
    }

    Err(PortError::NoFreePort { base, last })
}
