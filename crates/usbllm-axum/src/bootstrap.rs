//! Listener setup and the serve loop.

use std::io;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use usbllm_core::LauncherConfig;

use crate::routes::create_router;
use crate::state::AppState;

/// Loopback only; the launcher is never exposed on other interfaces.
pub const LISTEN_HOST: &str = "127.0.0.1";

/// Extra ports tried after the configured one is taken.
pub const DEFAULT_BIND_RETRIES: u16 = 10;

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub bind_retries: u16,
}

impl ServerConfig {
    pub fn from_launcher(config: &LauncherConfig) -> Self {
        Self {
            host: LISTEN_HOST.to_string(),
            port: config.listen_port,
            bind_retries: DEFAULT_BIND_RETRIES,
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Bind `host:port`, moving to the next port on `AddrInUse` up to
/// `bind_retries` times.
pub async fn bind_with_retry(config: &ServerConfig) -> io::Result<TcpListener> {
    let mut port = config.port;
    let mut retries_left = config.bind_retries;

    loop {
        match TcpListener::bind((config.host.as_str(), port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse && retries_left > 0 => {
                let Some(next) = port.checked_add(1) else {
                    return Err(e);
                };
                warn!("Port {port} in use, trying {next}...");
                port = next;
                retries_left -= 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Serve the launcher on `listener` until `cancel` fires.
///
/// Cancellation stops accepting new connections; streams already open are
/// allowed to finish.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("Launcher listening at http://{addr}");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Launcher server shut down");
    Ok(())
}

/// Resolve on the first SIGINT (Ctrl-C) or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
