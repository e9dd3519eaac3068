//! Streaming relay for OpenAI-style chat-completion endpoints.
//!
//! One call to [`StreamRelay::stream`] issues one POST to
//! `{base}/v1/chat/completions` and turns the SSE response body into a
//! finite sequence of [`RelayEvent`]s ending in [`RelayEvent::Done`].

mod frames;

pub use frames::FrameDecoder;

use async_stream::stream;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde_json::{Value, json};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use usbllm_core::RelayEvent;
use usbllm_core::prompt::DEFAULT_SYSTEM_PROMPT;

/// Upstream sentinel that terminates a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("Upstream error: {status} {reason}")]
    UpstreamHttp { status: u16, reason: String },

    #[error("Upstream transport error: {0}")]
    Transport(String),
}

/// Events from one relay session.
pub type RelayStream = BoxStream<'static, Result<RelayEvent, RelayError>>;

#[derive(Debug, Clone)]
pub struct StreamRelay {
    client: reqwest::Client,
    model: String,
    temperature: f32,
}

impl StreamRelay {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self::with_client(reqwest::Client::new(), model, temperature)
    }

    pub fn with_client(client: reqwest::Client, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    /// Open one relay session.
    ///
    /// Without a base URL nothing is requested and the stream is
    /// `[Meta({"source":"stub"}), Done]`. Otherwise a successful response
    /// opens with `Meta({"source":"llama-server", url, model})`. An empty `system` falls back to
    /// [`DEFAULT_SYSTEM_PROMPT`].
    ///
    /// Reading stops as soon as `cancel` fires; the stream then ends without
    /// a trailing `Done` and the upstream connection is dropped.
    pub fn stream(
        &self,
        base_url: Option<&str>,
        user: &str,
        system: Option<&str>,
        cancel: CancellationToken,
    ) -> RelayStream {
        let Some(base_url) = base_url else {
            return stream::iter([
                Ok(RelayEvent::Meta(json!({ "source": "stub" }))),
                Ok(RelayEvent::Done),
            ])
            .boxed();
        };

        let url = completions_url(base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": system.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_SYSTEM_PROMPT),
                },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
            "stream": true,
        });
        let source = json!({
            "source": "llama-server",
            "url": base_url,
            "model": self.model,
        });
        let client = self.client.clone();

        stream! {
            'session: {
                debug!(%url, "Opening upstream stream");
                let sending = client.post(&url).json(&body).send();
                let response = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    response = sending => Some(response),
                };
                let Some(response) = response else {
                    debug!(%url, "Relay cancelled before upstream responded");
                    break 'session;
                };

                let response = match response {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(%url, error = %e, "Upstream request failed");
                        yield Err(RelayError::Transport(e.to_string()));
                        break 'session;
                    }
                };

                let status = response.status();
                if !status.is_success() {
                    warn!(%url, status = status.as_u16(), "Upstream returned an error status");
                    yield Err(RelayError::UpstreamHttp {
                        status: status.as_u16(),
                        reason: status.canonical_reason().unwrap_or_default().to_string(),
                    });
                    break 'session;
                }

                yield Ok(RelayEvent::Meta(source));

                let mut body = response.bytes_stream();
                let mut decoder = FrameDecoder::new();

                loop {
                    let chunk = tokio::select! {
                        biased;
                        () = cancel.cancelled() => None,
                        chunk = body.next() => Some(chunk),
                    };
                    let Some(chunk) = chunk else {
                        debug!(%url, "Relay cancelled mid-stream");
                        break 'session;
                    };

                    let at_eof = match chunk {
                        Some(Ok(bytes)) => {
                            decoder.push(&bytes);
                            false
                        }
                        Some(Err(e)) => {
                            warn!(%url, error = %e, "Upstream body read failed");
                            yield Err(RelayError::Transport(e.to_string()));
                            break 'session;
                        }
                        None => {
                            decoder.finish();
                            true
                        }
                    };

                    while let Some(frame) = decoder.next_frame() {
                        for data in frame {
                            match classify(&data) {
                                Some(RelayEvent::Done) => {
                                    yield Ok(RelayEvent::Done);
                                    break 'session;
                                }
                                Some(event) => yield Ok(event),
                                None => {}
                            }
                        }
                    }

                    if at_eof {
                        debug!(%url, "Upstream closed without [DONE]");
                        break;
                    }
                }

                yield Ok(RelayEvent::Done);
            }
        }
        .boxed()
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
}

/// Map one `data:` payload to an event.
///
/// Returns `None` for payloads that are not JSON.
pub fn classify(data: &str) -> Option<RelayEvent> {
    if data == DONE_SENTINEL {
        return Some(RelayEvent::Done);
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            trace!(error = %e, "Skipping non-JSON data line");
            return None;
        }
    };

    Some(match delta_text(&value) {
        Some(text) => RelayEvent::ContentDelta(text.to_string()),
        None => RelayEvent::Meta(value),
    })
}

/// `choices[0].delta.content`, else `choices[0].text`; empty strings do not count.
fn delta_text(value: &Value) -> Option<&str> {
    fn non_empty(v: Option<&Value>) -> Option<&str> {
        v.and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    let choice = value.get("choices")?.get(0)?;

    non_empty(choice.pointer("/delta/content")).or_else(|| non_empty(choice.get("text")))
}
