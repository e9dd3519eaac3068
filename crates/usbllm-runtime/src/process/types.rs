//! Shared types for process management.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use usbllm_core::LauncherConfig;

use super::LOOPBACK_HOST;
use super::ports::{DEFAULT_BASE_PORT, DEFAULT_PORT_ATTEMPTS};

/// Everything needed to spawn one llama-server instance.
///
/// Built fresh for every start attempt and not retained afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub executable: PathBuf,
    pub model_file: PathBuf,
    /// Used verbatim when present; otherwise a free port is allocated.
    pub prefer_port: Option<u16>,
    pub ctx_size: Option<u32>,
    pub threads: Option<u32>,
    pub temp_dir: Option<PathBuf>,
    pub log_disable: bool,
}

impl StartRequest {
    pub fn new(executable: impl Into<PathBuf>, model_file: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            model_file: model_file.into(),
            prefer_port: None,
            ctx_size: None,
            threads: None,
            temp_dir: None,
            log_disable: false,
        }
    }

    /// Build a request from the launcher configuration and a resolved model file.
    ///
    /// Returns `None` when no llama-server binary is configured.
    pub fn from_config(config: &LauncherConfig, model_file: &Path) -> Option<Self> {
        let executable = config.bin_path.clone()?;
        Some(Self {
            executable,
            model_file: model_file.to_path_buf(),
            prefer_port: config.prefer_port,
            ctx_size: config.ctx_size,
            threads: config.threads,
            temp_dir: config.temp_dir.clone(),
            log_disable: config.log_disable,
        })
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.prefer_port = Some(port);
        self
    }

    /// Command-line arguments for a server bound to `port`.
    ///
    /// Absent optional settings are omitted rather than passed empty.
    pub fn args(&self, port: u16) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-m".into(),
            self.model_file.clone().into_os_string(),
            "--host".into(),
            LOOPBACK_HOST.into(),
            "--port".into(),
            port.to_string().into(),
        ];

        if let Some(ctx) = self.ctx_size {
            args.push("--ctx-size".into());
            args.push(ctx.to_string().into());
        }

        if let Some(threads) = self.threads {
            args.push("--threads".into());
            args.push(threads.to_string().into());
        }

        if let Some(dir) = &self.temp_dir {
            args.push("--temp-dir".into());
            args.push(dir.clone().into_os_string());
        }

        if self.log_disable {
            args.push("--log-disable".into());
        }

        args
    }
}

/// Snapshot of a ready local server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub pid: u32,
    pub port: u16,
    /// `http://127.0.0.1:<port>`
    pub base_url: String,
}

impl ServerInfo {
    pub fn new(pid: u32, port: u16) -> Self {
        Self {
            pid,
            port,
            base_url: format!("http://{LOOPBACK_HOST}:{port}"),
        }
    }
}

/// Tunables for [`super::ProcessSupervisor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// First port probed when the request has no preferred port.
    pub base_port: u16,
    /// Number of consecutive ports probed from `base_port`.
    pub port_attempts: u16,
    /// How long a spawned server may take to accept connections.
    pub ready_timeout: Duration,
    /// Time between SIGTERM and SIGKILL on stop.
    pub stop_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            base_port: DEFAULT_BASE_PORT,
            port_attempts: DEFAULT_PORT_ATTEMPTS,
            ready_timeout: Duration::from_secs(40),
            stop_grace: Duration::from_millis(1500),
        }
    }
}
