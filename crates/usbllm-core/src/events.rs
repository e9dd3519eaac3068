//! Stream event vocabulary shared by the relay and the HTTP adapter.
//!
//! `RelayEvent` is what the upstream relay produces; `OutboundFrame` is what
//! a client sees on `/api/stream`. Every upstream event maps to exactly one
//! outbound frame.

use serde::Serialize;
use serde_json::{Value, json};

/// Normalized unit of an upstream chat-completion stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A piece of generated text.
    ContentDelta(String),
    /// Any well-formed JSON payload that carried no text, forwarded as-is.
    Meta(Value),
    /// End of the stream. Always the last event of a relay session.
    Done,
}

impl RelayEvent {
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// SSE event name of an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Meta,
    Token,
    Upstream,
    Ping,
    Error,
    Done,
}

impl FrameKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Token => "token",
            Self::Upstream => "upstream",
            Self::Ping => "ping",
            Self::Error => "error",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-visible SSE frame: event name plus JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    pub kind: FrameKind,
    pub data: Value,
}

impl OutboundFrame {
    pub const fn new(kind: FrameKind, data: Value) -> Self {
        Self { kind, data }
    }

    pub const fn meta(data: Value) -> Self {
        Self::new(FrameKind::Meta, data)
    }

    pub fn token(text: impl Into<String>) -> Self {
        Self::new(FrameKind::Token, json!({ "text": text.into() }))
    }

    pub const fn upstream(raw: Value) -> Self {
        Self::new(FrameKind::Upstream, raw)
    }

    pub fn ping() -> Self {
        Self::new(FrameKind::Ping, json!({}))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FrameKind::Error, json!({ "message": message.into() }))
    }

    pub fn done() -> Self {
        Self::new(FrameKind::Done, json!({}))
    }
}

impl From<RelayEvent> for OutboundFrame {
    fn from(event: RelayEvent) -> Self {
        match event {
            RelayEvent::ContentDelta(text) => Self::token(text),
            RelayEvent::Meta(raw) => Self::upstream(raw),
            RelayEvent::Done => Self::done(),
        }
    }
}
