//! Shared helpers for the launcher HTTP tests.
#![allow(dead_code)]

use std::convert::Infallible;
use std::path::Path;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;
use usbllm_axum::{AppState, create_router};
use usbllm_core::LauncherConfig;

/// A configuration with no upstream and no autostart, reading its model
/// registry from `models_dir`.
pub fn stub_config(models_dir: &Path) -> LauncherConfig {
    LauncherConfig {
        models_dir: models_dir.to_path_buf(),
        ..LauncherConfig::default()
    }
}

pub fn app(config: LauncherConfig) -> Router {
    create_router(AppState::new(config))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: Router, request: Request<Body>) -> TestResponse {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(app: Router, uri: &str) -> TestResponse {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_stream(app: Router, body: impl Into<Body>) -> TestResponse {
    let request = Request::post("/api/stream")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();
    send(app, request).await
}

/// Split an SSE body into `(event, data)` pairs.
pub fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .map(|frame| {
            let mut event = String::new();
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = name.trim().to_string();
                } else if let Some(payload) = line.strip_prefix("data:") {
                    data.push_str(payload.trim());
                }
            }
            (event, serde_json::from_str(&data).expect("SSE data is not JSON"))
        })
        .collect()
}

pub fn event_names(frames: &[(String, Value)]) -> Vec<&str> {
    frames.iter().map(|(event, _)| event.as_str()).collect()
}

/// Concatenated `token` texts.
pub fn token_text(frames: &[(String, Value)]) -> String {
    frames
        .iter()
        .filter(|(event, _)| event == "token")
        .filter_map(|(_, data)| data["text"].as_str())
        .collect()
}

/// Start a fake chat-completion server answering every request with `reply`.
pub async fn fake_upstream(status: StatusCode, reply: &'static str) -> String {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || async move {
            let body = Body::from_stream(futures_util::stream::iter([Ok::<_, Infallible>(
                Bytes::from_static(reply.as_bytes()),
            )]));
            (status, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
