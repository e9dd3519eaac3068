//! Shared application state type.

use std::sync::Arc;

use usbllm_core::LauncherConfig;
use usbllm_runtime::{ProcessSupervisor, StreamRelay};

/// State shared by every handler.
///
/// Configuration is read once at startup. The supervisor is the only mutable
/// state shared between requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LauncherConfig>,
    pub supervisor: Arc<ProcessSupervisor>,
    pub relay: StreamRelay,
}

impl AppState {
    pub fn new(config: LauncherConfig) -> Self {
        Self::with_supervisor(config, Arc::new(ProcessSupervisor::default()))
    }

    pub fn with_supervisor(config: LauncherConfig, supervisor: Arc<ProcessSupervisor>) -> Self {
        let relay = StreamRelay::new(config.model.clone(), config.temperature);
        Self {
            config: Arc::new(config),
            supervisor,
            relay,
        }
    }
}
