//! Graceful shutdown logic for `tokio::process::Child` with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use tokio::time::timeout;
#[cfg(unix)]
use tracing::debug;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Gracefully shut down a child process with SIGTERM, escalating to SIGKILL if needed.
///
/// # Strategy
/// 1. Send SIGTERM and wait up to `grace` for a clean exit
/// 2. If still running, send SIGKILL
/// 3. Wait for process reaping (required to avoid zombies)
///
/// # Platform behavior
/// - Unix: Uses nix crate for SIGTERM, then SIGKILL via `.kill()`
/// - Windows: Immediately calls `.kill()` (no graceful shutdown available)
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        shutdown_unix(child, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        shutdown_windows(child).await
    }
}

#[cfg(unix)]
async fn shutdown_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    // Already reaped or exited on its own
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    let pid = child
        .id()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "child has no PID"))?;
    let raw_pid = i32::try_from(pid).map_err(io::Error::other)?;

    if let Err(e) = signal::kill(Pid::from_raw(raw_pid), Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        return result;
    }

    debug!(pid, grace_ms = grace.as_millis(), "Grace window elapsed, sending SIGKILL");
    child.kill().await?;
    child.wait().await
}

#[cfg(not(unix))]
async fn shutdown_windows(child: &mut Child) -> io::Result<ExitStatus> {
    // Windows has no SIGTERM equivalent - terminate immediately
    child.kill().await?;
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;
    use tokio::time::sleep;

    const GRACE: Duration = Duration::from_millis(1500);

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_responds_to_sigterm() {
        let mut child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");

        let started = std::time::Instant::now();
        let status = shutdown_child(&mut child, GRACE).await.unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < GRACE);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_escalates_when_sigterm_is_ignored() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; sleep 30")
            .spawn()
            .expect("failed to spawn sh");
        // Let the shell install its trap
        sleep(Duration::from_millis(200)).await;

        let grace = Duration::from_millis(300);
        let started = std::time::Instant::now();
        let result = shutdown_child(&mut child, grace).await;
        assert!(result.is_ok());
        assert!(started.elapsed() >= grace);
    }

    #[tokio::test]
    async fn shutdown_handles_already_exited() {
        let mut child = Command::new("echo")
            .arg("test")
            .spawn()
            .expect("failed to spawn echo");

        sleep(Duration::from_millis(100)).await;

        let result = shutdown_child(&mut child, GRACE).await;
        assert!(result.is_ok());
    }
}
