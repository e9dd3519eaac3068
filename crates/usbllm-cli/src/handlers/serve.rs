//! `usbllm serve`: run the launcher until a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use usbllm_axum::{AppState, ServerConfig, bind_with_retry, serve, shutdown_signal};
use usbllm_core::LauncherConfig;
use usbllm_runtime::ProcessSupervisor;

/// Time allowed for closing the listener and stopping llama-server after a
/// signal. The process exits when it elapses, finished or not.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(1500);

fn describe_mode(config: &LauncherConfig) -> &'static str {
    if config.upstream_url.is_some() {
        "external upstream"
    } else if config.autostart_configured() {
        "local autostart"
    } else {
        "offline stub"
    }
}

pub async fn execute(config: LauncherConfig) -> anyhow::Result<()> {
    let server_config = ServerConfig::from_launcher(&config);
    info!(
        mode = describe_mode(&config),
        upstream = config.upstream_url.as_deref().unwrap_or("-"),
        model = %config.model,
        "Starting usb-llm launcher"
    );

    let supervisor = Arc::new(ProcessSupervisor::default());
    let state = AppState::with_supervisor(config, Arc::clone(&supervisor));

    let listener = bind_with_retry(&server_config).await.with_context(|| {
        format!(
            "Failed to bind {}:{} (after {} retries)",
            server_config.host, server_config.port, server_config.bind_retries
        )
    })?;

    let cancel = CancellationToken::new();
    let mut server = tokio::spawn(serve(listener, state, cancel.clone()));

    tokio::select! {
        () = shutdown_signal() => {}
        finished = &mut server => {
            supervisor.stop().await;
            return finished.context("Server task failed")?;
        }
    }

    info!("Shutting down...");
    cancel.cancel();

    let graceful = async {
        let (server_result, ()) = tokio::join!(server, supervisor.stop());
        match server_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Server stopped with error: {e:#}"),
            Err(e) => warn!("Server task failed: {e}"),
        }
    };

    if tokio::time::timeout(SHUTDOWN_GRACE, graceful).await.is_err() {
        warn!("Shutdown grace period elapsed; exiting anyway");
    } else {
        info!("Closed.");
    }
    Ok(())
}
