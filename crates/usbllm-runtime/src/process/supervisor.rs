//! Single-instance supervisor for the local llama-server.
//!
//! The supervisor owns the lifecycle state internally; HTTP handlers only call
//! [`ProcessSupervisor::ensure_started`], [`ProcessSupervisor::stop`] and the
//! non-blocking introspection methods.
//!
//! Key design decisions:
//! - **One pending slot**: concurrent `ensure_started` calls share a single
//!   in-flight start attempt, so a port is allocated and a process spawned at
//!   most once per attempt
//! - **Detached attempts**: the attempt runs as its own task, so a client that
//!   disconnects mid-start never cancels a start other callers are awaiting
//! - **Generation tags**: every attempt carries a generation number; a stop or
//!   crash only clears state belonging to its own generation
//! - **Monitor task**: each child is owned by a task that reaps it, which is
//!   how unsolicited exits are detected

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ports::{PortError, find_free_port};
use super::readiness::{ReadinessError, wait_for_ready};
use super::shutdown::shutdown_child;
use super::types::{ServerInfo, StartRequest, SupervisorConfig};

/// Error from supervisor operations.
///
/// Cloneable so one failed attempt can be reported to every coalesced caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    NoFreePort(#[from] PortError),

    #[error("Failed to start llama-server: {0}")]
    SpawnFailure(String),

    #[error(transparent)]
    ReadinessTimeout(#[from] ReadinessError),

    /// A `stop()` arrived while this attempt was still starting.
    #[error("llama-server start was cancelled by a stop request")]
    Aborted,

    #[error("Internal supervisor error: {0}")]
    Internal(String),
}

/// Lifecycle state as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorStatus {
    Idle,
    Starting,
    Ready(ServerInfo),
}

type StartAttempt = Shared<BoxFuture<'static, Result<String, SupervisorError>>>;

/// A running, ready child owned by its monitor task.
struct ServerHandle {
    info: ServerInfo,
    generation: u64,
    /// Fires once the child has exited for any reason.
    exited: CancellationToken,
    /// Sending (or dropping) asks the monitor to shut the child down.
    stop_tx: oneshot::Sender<()>,
    monitor: JoinHandle<()>,
}

impl ServerHandle {
    /// Ask the monitor to terminate the child and wait until it is reaped.
    async fn shutdown(self) {
        let Self {
            info,
            stop_tx,
            monitor,
            ..
        } = self;
        let _ = stop_tx.send(());
        if let Err(e) = monitor.await {
            error!(pid = info.pid, port = info.port, error = %e, "llama-server monitor task failed");
        }
    }
}

#[derive(Default)]
enum State {
    #[default]
    Idle,
    Starting {
        generation: u64,
        attempt: StartAttempt,
        /// Tripped by `stop()` to abandon the attempt and kill its child.
        abort: CancellationToken,
    },
    Ready(ServerHandle),
}

#[derive(Default)]
struct Inner {
    state: State,
    next_generation: u64,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Supervisor for at most one local llama-server process.
///
/// State machine: `Idle -> Starting -> Ready -> Idle` (stop or crash), and
/// `Starting -> Idle` when spawning or readiness fails.
///
/// # Example
///
/// ```ignore
/// let supervisor = ProcessSupervisor::new(SupervisorConfig::default());
/// let url = supervisor.ensure_started(request).await?;
/// assert_eq!(supervisor.current_url(), Some(url));
/// supervisor.stop().await;
/// ```
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    inner: Arc<Mutex<Inner>>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl ProcessSupervisor {
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Return the base URL of a ready server, starting one if needed.
    ///
    /// - Ready: returns the existing URL without spawning
    /// - Starting: awaits the in-flight attempt
    /// - Idle: launches a new attempt that later callers will share
    ///
    /// A failed attempt leaves the supervisor idle, so the next call retries
    /// from scratch.
    pub async fn ensure_started(&self, request: StartRequest) -> Result<String, SupervisorError> {
        let attempt = {
            let mut inner = lock(&self.inner);
            match &inner.state {
                State::Ready(handle) => return Ok(handle.info.base_url.clone()),
                State::Starting { attempt, .. } => {
                    debug!("Joining in-flight llama-server start");
                    attempt.clone()
                }
                State::Idle => {
                    inner.next_generation += 1;
                    let generation = inner.next_generation;
                    let abort = CancellationToken::new();
                    let task = tokio::spawn(run_start_attempt(
                        Arc::downgrade(&self.inner),
                        self.config.clone(),
                        request,
                        generation,
                        abort.clone(),
                    ));
                    let attempt: StartAttempt = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(SupervisorError::Internal(format!("start task failed: {e}")))
                        })
                    }
                    .boxed()
                    .shared();
                    inner.state = State::Starting {
                        generation,
                        attempt: attempt.clone(),
                        abort,
                    };
                    attempt
                }
            }
        };

        attempt.await
    }

    /// Stop the local server if one is running. Idempotent.
    ///
    /// State is cleared before waiting for the child to exit, so concurrent
    /// callers see `Idle` immediately and never a half torn-down server.
    /// A start still in flight is aborted: its child is shut down before this
    /// returns and its callers get [`SupervisorError::Aborted`].
    pub async fn stop(&self) {
        let previous = std::mem::take(&mut lock(&self.inner).state);

        match previous {
            State::Idle => debug!("Stop requested with no llama-server running"),
            State::Starting {
                generation,
                attempt,
                abort,
            } => {
                info!(generation, "Stop requested while llama-server was starting");
                abort.cancel();
                let _ = attempt.await;
                info!(generation, "Aborted llama-server start");
            }
            State::Ready(handle) => {
                info!(pid = handle.info.pid, port = handle.info.port, "Stopping llama-server");
                handle.shutdown().await;
                info!("llama-server stopped");
            }
        }
    }

    /// Base URL of the ready server, if any. Never blocks on I/O.
    pub fn current_url(&self) -> Option<String> {
        match &lock(&self.inner).state {
            State::Ready(handle) => Some(handle.info.base_url.clone()),
            State::Idle | State::Starting { .. } => None,
        }
    }

    pub fn status(&self) -> SupervisorStatus {
        match &lock(&self.inner).state {
            State::Idle => SupervisorStatus::Idle,
            State::Starting { .. } => SupervisorStatus::Starting,
            State::Ready(handle) => SupervisorStatus::Ready(handle.info.clone()),
        }
    }
}

/// One start attempt: launch, then commit to `Ready` or roll back to `Idle`.
async fn run_start_attempt(
    inner: Weak<Mutex<Inner>>,
    config: SupervisorConfig,
    request: StartRequest,
    generation: u64,
    abort: CancellationToken,
) -> Result<String, SupervisorError> {
    let launched = launch(&inner, &config, &request, generation, &abort).await;

    let Some(inner) = inner.upgrade() else {
        // Supervisor dropped mid-start; dropping the handle stops the child.
        return Err(SupervisorError::Aborted);
    };

    let rejected = {
        let mut guard = lock(&inner);
        let current = matches!(
            &guard.state,
            State::Starting { generation: g, .. } if *g == generation
        );

        match launched {
            Ok(handle) if current && !handle.exited.is_cancelled() => {
                let url = handle.info.base_url.clone();
                guard.state = State::Ready(handle);
                Ok(url)
            }
            Ok(handle) if current => {
                guard.state = State::Idle;
                let error = SupervisorError::SpawnFailure(format!(
                    "llama-server exited right after becoming ready on port {}",
                    handle.info.port
                ));
                Err((Some(handle), error))
            }
            Ok(handle) => Err((Some(handle), SupervisorError::Aborted)),
            Err(error) => {
                if current {
                    guard.state = State::Idle;
                }
                Err((None, error))
            }
        }
    };

    match rejected {
        Ok(url) => {
            info!(url = %url, generation, "llama-server is ready");
            Ok(url)
        }
        Err((handle, error)) => {
            if let Some(handle) = handle {
                handle.shutdown().await;
            }
            warn!(generation, error = %error, "llama-server start attempt failed");
            Err(error)
        }
    }
}

/// Allocate a port, spawn the child, and wait for it to accept connections.
///
/// On readiness failure or abort the child is shut down before returning.
async fn launch(
    inner: &Weak<Mutex<Inner>>,
    config: &SupervisorConfig,
    request: &StartRequest,
    generation: u64,
    abort: &CancellationToken,
) -> Result<ServerHandle, SupervisorError> {
    if abort.is_cancelled() {
        return Err(SupervisorError::Aborted);
    }

    let port = match request.prefer_port {
        Some(port) => port,
        None => find_free_port(config.base_port, config.port_attempts)?,
    };

    let args = request.args(port);
    info!(
        executable = %request.executable.display(),
        model = %request.model_file.display(),
        port,
        generation,
        "Spawning llama-server"
    );

    let child = Command::new(&request.executable)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            SupervisorError::SpawnFailure(format!(
                "could not execute {}: {e}",
                request.executable.display()
            ))
        })?;

    let pid = child.id().unwrap_or_default();
    let exited = CancellationToken::new();
    let (stop_tx, stop_rx) = oneshot::channel();
    let monitor = tokio::spawn(monitor_child(
        child,
        stop_rx,
        exited.clone(),
        inner.clone(),
        generation,
        config.stop_grace,
    ));

    let handle = ServerHandle {
        info: ServerInfo::new(pid, port),
        generation,
        exited,
        stop_tx,
        monitor,
    };

    let ready = tokio::select! {
        () = abort.cancelled() => Err(SupervisorError::Aborted),
        result = wait_for_ready(port, config.ready_timeout) => result.map_err(SupervisorError::from),
        () = handle.exited.cancelled() => Err(SupervisorError::SpawnFailure(format!(
            "llama-server exited before accepting connections on port {port}"
        ))),
    };

    match ready {
        Ok(()) => Ok(handle),
        Err(error) => {
            handle.shutdown().await;
            Err(error)
        }
    }
}

/// What ended the monitor's wait.
enum MonitorWake {
    Exited(std::io::Result<ExitStatus>),
    StopRequested,
}

/// Own the child until it exits, shutting it down when asked.
async fn monitor_child(
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    exited: CancellationToken,
    inner: Weak<Mutex<Inner>>,
    generation: u64,
    grace: Duration,
) {
    let pid = child.id();

    // A dropped sender counts as a stop request.
    let wake = tokio::select! {
        status = child.wait() => MonitorWake::Exited(status),
        _ = stop_rx => MonitorWake::StopRequested,
    };

    match wake {
        MonitorWake::StopRequested => {
            match shutdown_child(&mut child, grace).await {
                Ok(status) => debug!(?pid, %status, "llama-server terminated"),
                Err(e) => warn!(?pid, error = %e, "Failed to terminate llama-server"),
            }
            exited.cancel();
        }
        MonitorWake::Exited(status) => {
            exited.cancel();
            let was_ready = inner
                .upgrade()
                .is_some_and(|inner| clear_if_ready(&inner, generation));

            match status {
                Ok(status) if was_ready && !status.success() => {
                    warn!(?pid, %status, "llama-server exited unexpectedly");
                }
                Ok(status) => debug!(?pid, %status, was_ready, "llama-server exited"),
                Err(e) => warn!(?pid, error = %e, "Failed to wait on llama-server"),
            }
        }
    }
}

/// Drop a `Ready` state that belongs to `generation`. Returns whether it did.
fn clear_if_ready(inner: &Mutex<Inner>, generation: u64) -> bool {
    let mut guard = lock(inner);
    let matches = matches!(&guard.state, State::Ready(handle) if handle.generation == generation);
    if matches {
        guard.state = State::Idle;
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_when_idle_is_a_no_op() {
        let supervisor = ProcessSupervisor::default();
        supervisor.stop().await;
        supervisor.stop().await;
        assert_eq!(supervisor.status(), SupervisorStatus::Idle);
        assert_eq!(supervisor.current_url(), None);
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_failure_and_leaves_idle() {
        let supervisor = ProcessSupervisor::default();
        let request = StartRequest::new("/nonexistent/llama-server", "/models/none.gguf")
            .with_port(1);

        let result = supervisor.ensure_started(request).await;
        assert!(matches!(result, Err(SupervisorError::SpawnFailure(_))));
        assert_eq!(supervisor.status(), SupervisorStatus::Idle);
    }

    #[test]
    fn errors_are_human_readable() {
        let error = SupervisorError::from(PortError::NoFreePort {
            base: 8080,
            last: 8099,
        });
        assert_eq!(error.to_string(), "No free port found in range 8080-8099");
    }
}
