//! Per-request source selection and the three draft paths.
//!
//! The route is picked from static configuration: an upstream URL wins, then
//! local autostart, then the stub. Every path writes into the same
//! [`FrameSink`] and ends with `done` unless the client left first.

use futures_util::StreamExt;
use serde_json::json;
use tracing::{info, warn};
use usbllm_core::prompt::DraftPrompt;
use usbllm_core::{LauncherConfig, OutboundFrame, ResolvedModel};
use usbllm_runtime::{RelayStream, StartRequest};

use crate::sse::FrameSink;
use crate::state::AppState;
use crate::stub::{StubOptions, stream_stub};

pub const LOCAL_MODEL_MISSING_MESSAGE: &str = "Local model not found (USBLLM_MODEL_FILE missing and no resolved model by USBLLM_MODEL_ID). Falling back to stub.";

/// Where one draft request gets its text from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftRoute {
    /// Statically configured upstream server.
    External { url: String },
    /// Supervised llama-server with a model file on disk.
    Local(StartRequest),
    /// Local autostart is configured but no model file could be found.
    LocalModelMissing,
    /// No source configured.
    Stub,
}

impl DraftRoute {
    /// Pick the route for a request.
    ///
    /// `resolve` is only called when local autostart is configured.
    pub fn select(config: &LauncherConfig, resolve: impl FnOnce() -> ResolvedModel) -> Self {
        if let Some(url) = &config.upstream_url {
            return Self::External { url: url.clone() };
        }
        if !config.autostart_configured() {
            return Self::Stub;
        }

        let resolved = resolve();
        let Some(model_file) = resolved.usable_path() else {
            return Self::LocalModelMissing;
        };
        StartRequest::from_config(config, model_file).map_or(Self::Stub, Self::Local)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::External { .. } => "external",
            Self::Local(_) => "local",
            Self::LocalModelMissing => "local-missing",
            Self::Stub => "stub",
        }
    }
}

/// Drive one draft request to completion.
pub async fn drive(
    state: &AppState,
    route: DraftRoute,
    prompt: DraftPrompt,
    stub: StubOptions,
    sink: &FrameSink,
) {
    match route {
        DraftRoute::External { url } => {
            let meta = json!({
                "source": "llama-server",
                "url": url,
                "model": state.config.model,
                "started_at": chrono::Utc::now().to_rfc3339(),
            });
            if sink.send(OutboundFrame::meta(meta)).await {
                relay_into(state, &url, &prompt, sink).await;
            }
        }
        DraftRoute::Local(request) => drive_local(state, request, &prompt, sink).await,
        DraftRoute::LocalModelMissing => {
            warn!("Local autostart configured but no model file found; using stub");
            if sink.send(OutboundFrame::error(LOCAL_MODEL_MISSING_MESSAGE)).await {
                stream_stub(sink, &prompt.user, stub).await;
            }
        }
        DraftRoute::Stub => stream_stub(sink, &prompt.user, stub).await,
    }
}

async fn drive_local(state: &AppState, request: StartRequest, prompt: &DraftPrompt, sink: &FrameSink) {
    if !sink
        .send(OutboundFrame::meta(
            json!({ "source": "supervisor", "status": "starting" }),
        ))
        .await
    {
        return;
    }

    // The start attempt is shared and detached: leaving early here never
    // aborts it for other requests.
    let started = tokio::select! {
        () = sink.cancel_token().cancelled_owned() => return,
        started = state.supervisor.ensure_started(request) => started,
    };

    match started {
        Ok(url) => {
            info!(%url, "Local llama-server ready");
            let ready = json!({ "source": "supervisor", "status": "ready", "url": url });
            if sink.send(OutboundFrame::meta(ready)).await {
                relay_into(state, &url, prompt, sink).await;
            }
        }
        Err(e) => {
            warn!(error = %e, "Local llama-server failed to start");
            if sink.send(OutboundFrame::error(e.to_string())).await {
                sink.send(OutboundFrame::done()).await;
            }
        }
    }
}

async fn relay_into(state: &AppState, url: &str, prompt: &DraftPrompt, sink: &FrameSink) {
    let events = state.relay.stream(
        Some(url),
        &prompt.user,
        prompt.system.as_deref(),
        sink.cancel_token(),
    );
    forward(events, sink).await;
}

/// Forward relay events as frames until `done`, an error, or disconnect.
pub async fn forward(mut events: RelayStream, sink: &FrameSink) {
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                let done = event.is_done();
                if !sink.send(OutboundFrame::from(event)).await || done {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "Upstream stream failed");
                if sink.send(OutboundFrame::error(e.to_string())).await {
                    sink.send(OutboundFrame::done()).await;
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use usbllm_core::{FrameKind, ModelStatus, RelayEvent};

    fn local_config() -> LauncherConfig {
        LauncherConfig {
            autostart: true,
            bin_path: Some(PathBuf::from("/opt/llama-server")),
            model_id: Some("tiny".into()),
            ..LauncherConfig::default()
        }
    }

    fn resolved_ok(path: &str) -> ResolvedModel {
        ResolvedModel {
            status: ModelStatus::Ok,
            abs_path: Some(PathBuf::from(path)),
            ..ResolvedModel::none()
        }
    }

    #[test]
    fn upstream_url_wins_without_resolving() {
        let config = LauncherConfig {
            upstream_url: Some("http://10.0.0.2:8080".into()),
            ..local_config()
        };
        let route = DraftRoute::select(&config, || panic!("must not resolve"));
        assert_eq!(
            route,
            DraftRoute::External {
                url: "http://10.0.0.2:8080".into()
            }
        );
    }

    #[test]
    fn unconfigured_is_stub() {
        let route = DraftRoute::select(&LauncherConfig::default(), || panic!("must not resolve"));
        assert_eq!(route, DraftRoute::Stub);

        let no_binary = LauncherConfig {
            bin_path: None,
            ..local_config()
        };
        assert_eq!(DraftRoute::select(&no_binary, ResolvedModel::none), DraftRoute::Stub);
    }

    #[test]
    fn local_with_model_on_disk() {
        let route = DraftRoute::select(&local_config(), || resolved_ok("/models/tiny.gguf"));
        let DraftRoute::Local(request) = route else {
            panic!("expected local route");
        };
        assert_eq!(request.executable, PathBuf::from("/opt/llama-server"));
        assert_eq!(request.model_file, PathBuf::from("/models/tiny.gguf"));
    }

    #[test]
    fn missing_model_degrades() {
        let missing = || ResolvedModel {
            status: ModelStatus::Missing,
            ..ResolvedModel::none()
        };
        assert_eq!(
            DraftRoute::select(&local_config(), missing),
            DraftRoute::LocalModelMissing
        );
    }

    #[tokio::test]
    async fn forward_maps_events_and_stops_at_done() {
        let events = futures_util::stream::iter([
            Ok(RelayEvent::ContentDelta("Hi".into())),
            Ok(RelayEvent::Meta(json!({"id": 1}))),
            Ok(RelayEvent::Done),
            Ok(RelayEvent::ContentDelta("late".into())),
        ])
        .boxed();
        let (sink, mut rx) = FrameSink::channel(8);
        forward(events, &sink).await;
        drop(sink);

        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        assert_eq!(
            frames,
            [
                OutboundFrame::token("Hi"),
                OutboundFrame::upstream(json!({"id": 1})),
                OutboundFrame::done(),
            ]
        );
    }

    #[tokio::test]
    async fn forward_reports_errors_then_done() {
        let events = futures_util::stream::iter([Err(usbllm_runtime::RelayError::UpstreamHttp {
            status: 502,
            reason: "Bad Gateway".into(),
        })])
        .boxed();
        let (sink, mut rx) = FrameSink::channel(8);
        forward(events, &sink).await;
        drop(sink);

        let error = rx.recv().await.unwrap();
        assert_eq!(error.kind, FrameKind::Error);
        assert_eq!(error.data["message"], "Upstream error: 502 Bad Gateway");
        assert_eq!(rx.recv().await.unwrap().kind, FrameKind::Done);
        assert_eq!(rx.recv().await, None);
    }
}
