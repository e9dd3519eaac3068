use axum::Json;
use axum::extract::State;
use serde::Serialize;
use usbllm_core::{LauncherConfig, ModelStatus, resolve_local_model};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// `upstream` when any real model server is in play, else `stub`.
    pub mode: &'static str,
    /// `external`, `local-ready`, `local-idle`, or null.
    pub submode: Option<&'static str>,
    pub runtime: RuntimeInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInfo {
    pub source: &'static str,
    pub selected_model_id: Option<String>,
}

fn submode(config: &LauncherConfig, local_running: bool) -> Option<&'static str> {
    if config.upstream_url.is_some() {
        Some("external")
    } else if config.autostart_configured() {
        Some(if local_running { "local-ready" } else { "local-idle" })
    } else {
        None
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = &state.config;
    let submode = submode(config, state.supervisor.current_url().is_some());

    let resolved = resolve_local_model(config);
    let source = if config.upstream_url.is_some() {
        "upstream"
    } else if resolved.status == ModelStatus::Ok {
        "local"
    } else {
        "none"
    };

    Json(HealthResponse {
        ok: true,
        mode: if submode.is_some() { "upstream" } else { "stub" },
        submode,
        runtime: RuntimeInfo {
            source,
            selected_model_id: resolved.id,
        },
    })
}
