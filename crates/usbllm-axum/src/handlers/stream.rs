//! `POST /api/stream`: validate the body, then stream the draft as SSE.

use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::{Instrument, info_span};
use usbllm_core::prompt::{DraftFields, DraftPrompt};
use usbllm_core::resolve_local_model;
use uuid::Uuid;

use crate::error::HttpError;
use crate::mode::{DraftRoute, drive};
use crate::sse::{FRAME_BUFFER, FrameSink, sse_response};
use crate::state::AppState;
use crate::stub::StubOptions;

/// Request body cap.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// A validated draft request.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub fields: DraftFields,
    pub max_tokens: Option<f64>,
    pub delay_ms: Option<f64>,
}

impl StreamRequest {
    /// Parse a raw body. Blank bodies count as `{}`.
    ///
    /// Fields of the wrong JSON type are treated as absent.
    pub fn parse(body: &[u8]) -> Result<Self, HttpError> {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        let value = if text.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(text).map_err(|e| HttpError::BadRequest(format!("Invalid JSON: {e}")))?
        };

        let string = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let number = |key: &str| value.get(key).and_then(Value::as_f64);

        Ok(Self {
            fields: DraftFields {
                prompt: string("prompt"),
                flow: string("flow"),
                tone: string("tone"),
                length: string("length"),
                subject: string("subject"),
                context: string("context"),
                instructions: string("instructions"),
            },
            max_tokens: number("max_tokens"),
            delay_ms: number("delay_ms"),
        })
    }
}

fn body_error(rejection: &BytesRejection) -> HttpError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        HttpError::PayloadTooLarge
    } else {
        HttpError::BadRequest(rejection.body_text())
    }
}

pub async fn stream_draft(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, HttpError> {
    let body = body.map_err(|rejection| body_error(&rejection))?;
    let request = StreamRequest::parse(&body)?;
    let prompt = DraftPrompt::from_fields(&request.fields, state.config.system_prelude.as_deref())
        .map_err(|e| HttpError::BadRequest(e.to_string()))?;
    let stub = StubOptions::from_request(request.max_tokens, request.delay_ms);

    let route = DraftRoute::select(&state.config, || resolve_local_model(&state.config));
    let request_id = Uuid::new_v4();
    let span = info_span!("draft", %request_id, route = route.name());

    let (sink, rx) = FrameSink::channel(FRAME_BUFFER);
    tokio::spawn(
        async move {
            tracing::debug!("Draft stream started");
            drive(&state, route, prompt, stub, &sink).await;
            let disconnected = sink.is_closed();
            sink.close();
            tracing::debug!(disconnected, "Draft stream finished");
        }
        .instrument(span),
    );

    Ok(sse_response(rx).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_body_is_empty_object() {
        let request = StreamRequest::parse(b"  \n").unwrap();
        assert_eq!(request.fields, DraftFields::default());
        assert_eq!(request.max_tokens, None);
    }

    #[test]
    fn wrong_types_are_ignored() {
        let request = StreamRequest::parse(br#"{"prompt": 5, "flow": "reply", "max_tokens": "9", "delay_ms": 25}"#).unwrap();
        assert_eq!(request.fields.prompt, None);
        assert_eq!(request.fields.flow.as_deref(), Some("reply"));
        assert_eq!(request.max_tokens, None);
        assert_eq!(request.delay_ms, Some(25.0));
    }

    #[test]
    fn invalid_json_is_bad_request() {
        let error = StreamRequest::parse(b"{not json").unwrap_err();
        assert!(matches!(error, HttpError::BadRequest(msg) if msg.starts_with("Invalid JSON")));
    }
}
