use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};
use usbllm_core::{ModelStatus, ResolvedModel, resolve_local_model};

use crate::state::AppState;

/// Display metadata of the selected model. Absolute paths are never exposed.
fn selected(resolved: &ResolvedModel) -> Value {
    match resolved.status {
        ModelStatus::Ok | ModelStatus::Missing => json!({
            "id": resolved.id,
            "name": resolved.name,
            "basename": resolved.basename,
            "license": resolved.license,
            "ctx": resolved.ctx,
            "quant": resolved.quant,
            "status": resolved.status,
        }),
        ModelStatus::None => json!({ "status": ModelStatus::None }),
    }
}

pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let resolved = resolve_local_model(&state.config);
    Json(json!({
        "selected": selected(&resolved),
        "ui": { "allowSelection": state.config.ui_allow_picker },
    }))
}
