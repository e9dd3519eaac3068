//! Readiness polling for a freshly spawned llama-server.
//!
//! Readiness means exactly "the port accepts a TCP connection". No bytes are
//! exchanged, so this works before the HTTP layer of the server is up.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

use super::LOOPBACK_HOST;

/// Fixed delay between connection attempts.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadinessError {
    #[error("Timeout waiting for llama-server to accept connections on port {port} after {timeout:?}")]
    Timeout { port: u16, timeout: Duration },
}

/// Poll `127.0.0.1:port` every [`READY_POLL_INTERVAL`] until it accepts a
/// connection or `timeout` has elapsed since the first attempt.
pub async fn wait_for_ready(port: u16, timeout: Duration) -> Result<(), ReadinessError> {
    wait_for_ready_every(port, timeout, READY_POLL_INTERVAL).await
}

/// [`wait_for_ready`] with an explicit poll interval.
pub async fn wait_for_ready_every(
    port: u16,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ReadinessError> {
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match TcpStream::connect((LOOPBACK_HOST, port)).await {
            Ok(stream) => {
                drop(stream);
                debug!(port = %port, attempts, "Port is accepting connections");
                return Ok(());
            }
            Err(e) => {
                trace!(port = %port, attempts, error = %e, "Not ready yet");
                if started.elapsed() > timeout {
                    return Err(ReadinessError::Timeout { port, timeout });
                }
                sleep(interval).await;
            }
        }
    }
}
