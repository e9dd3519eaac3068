//! Offline stub: a deterministic placeholder draft streamed token by token.
//!
//! Used whenever neither an upstream URL nor a usable local model is
//! configured, so the endpoint always answers something.

use std::time::Duration;

use serde_json::json;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;
use usbllm_core::OutboundFrame;

use crate::sse::FrameSink;

pub const DEFAULT_MAX_TOKENS: usize = 120;
pub const DEFAULT_DELAY_MS: f64 = 40.0;
pub const MIN_DELAY_MS: f64 = 10.0;
pub const MAX_DELAY_MS: f64 = 200.0;
pub const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Characters of the request echoed into the draft.
const PROMPT_EXCERPT_CHARS: usize = 200;

/// Pacing of one stub stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StubOptions {
    pub max_tokens: usize,
    pub delay: Duration,
    pub ping_every: Duration,
}

impl Default for StubOptions {
    fn default() -> Self {
        Self::from_request(None, None)
    }
}

impl StubOptions {
    /// Options from the optional `max_tokens` / `delay_ms` body fields.
    ///
    /// At least one token is always emitted and the delay is clamped to
    /// 10..=200 ms.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_request(max_tokens: Option<f64>, delay_ms: Option<f64>) -> Self {
        let max_tokens = max_tokens.map_or(DEFAULT_MAX_TOKENS, |n| n.max(1.0) as usize);
        let delay_ms = delay_ms
            .unwrap_or(DEFAULT_DELAY_MS)
            .clamp(MIN_DELAY_MS, MAX_DELAY_MS);

        Self {
            max_tokens,
            delay: Duration::from_secs_f64(delay_ms / 1000.0),
            ping_every: PING_INTERVAL,
        }
    }
}

/// The placeholder email wrapped around the first 200 characters of `prompt`.
pub fn build_draft(prompt: &str) -> String {
    let excerpt: String = prompt.chars().take(PROMPT_EXCERPT_CHARS).collect();
    format!(
        "Hello,\n\nThanks for your note. Here's a short first draft based on your request:\n\n\
         {excerpt}\n\nBest regards,\nUSB-LLM"
    )
}

fn is_delimiter(c: char) -> bool {
    c == ' ' || matches!(c, ',' | '.' | ';' | ':' | '!' | '?')
}

/// Naive tokenization for the demo stream.
///
/// Whitespace runs collapse to one space; spaces and `,.;:!?` become tokens of
/// their own. At most `max_tokens` tokens (minimum one) are returned.
pub fn tokenize_for_demo(text: &str, max_tokens: usize) -> Vec<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let limit = max_tokens.max(1);

    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in collapsed.chars() {
        if is_delimiter(c) {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(c.to_string());
        } else {
            word.push(c);
        }
        if tokens.len() >= limit {
            break;
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }

    tokens.truncate(limit);
    tokens
}

/// Stream the stub draft for `prompt` into `sink`.
///
/// Emits `meta`, then one `token` per tick and `done` one tick after the last
/// token, with a `ping` every [`StubOptions::ping_every`]. Returns as soon as
/// the client disconnects; both timers are dropped with it.
pub async fn stream_stub(sink: &FrameSink, prompt: &str, options: StubOptions) {
    let started_at = chrono::Utc::now().to_rfc3339();
    if !sink
        .send(OutboundFrame::meta(json!({ "source": "stub", "started_at": started_at })))
        .await
    {
        return;
    }

    let mut tokens = tokenize_for_demo(&build_draft(prompt), options.max_tokens).into_iter();
    let cancel = sink.cancel_token();

    let start = Instant::now();
    let mut tick = interval_at(start + options.delay, options.delay);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ping = interval_at(start + options.ping_every, options.ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Stub stream cancelled");
                return;
            }
            _ = tick.tick() => match tokens.next() {
                Some(text) => OutboundFrame::token(text),
                None => {
                    sink.send(OutboundFrame::done()).await;
                    return;
                }
            },
            _ = ping.tick() => OutboundFrame::ping(),
        };

        if !sink.send(frame).await {
            debug!("Stub stream stopped: client gone");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::FrameSink;
    use usbllm_core::FrameKind;

    #[test]
    fn tokenizer_keeps_punctuation_and_spaces() {
        assert_eq!(
            tokenize_for_demo("Hello,  world!\n\nHow are you?", 120),
            ["Hello", ",", " ", "world", "!", " ", "How", " ", "are", " ", "you", "?"]
        );
    }

    #[test]
    fn tokenizer_respects_limit_and_minimum() {
        assert_eq!(tokenize_for_demo("a b c", 2), ["a", " "]);
        assert_eq!(tokenize_for_demo("a b c", 0), ["a"]);
        assert!(tokenize_for_demo("   ", 5).is_empty());
    }

    #[test]
    fn draft_echoes_at_most_200_chars() {
        let prompt = "x".repeat(500);
        let draft = build_draft(&prompt);
        assert!(draft.starts_with("Hello,\n\nThanks for your note."));
        assert!(draft.ends_with("\n\nBest regards,\nUSB-LLM"));
        assert_eq!(draft.matches('x').count(), 200);
    }

    #[test]
    fn options_defaults_and_clamping() {
        let defaults = StubOptions::default();
        assert_eq!(defaults.max_tokens, 120);
        assert_eq!(defaults.delay, Duration::from_millis(40));
        assert_eq!(defaults.ping_every, Duration::from_secs(15));

        assert_eq!(StubOptions::from_request(None, Some(1.0)).delay, Duration::from_millis(10));
        assert_eq!(StubOptions::from_request(None, Some(5_000.0)).delay, Duration::from_millis(200));
        assert_eq!(StubOptions::from_request(Some(-3.0), None).max_tokens, 1);
        assert_eq!(StubOptions::from_request(Some(7.9), None).max_tokens, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_tokens_at_fixed_cadence_then_done() {
        let (sink, mut rx) = FrameSink::channel(8);
        let options = StubOptions::from_request(Some(3.0), Some(10.0));
        let task = tokio::spawn(async move { stream_stub(&sink, "hi", options).await });

        let start = Instant::now();
        let meta = rx.recv().await.unwrap();
        assert_eq!(meta.kind, FrameKind::Meta);
        assert_eq!(meta.data["source"], "stub");
        assert!(meta.data["started_at"].is_string());

        let mut last = start;
        for expected in ["Hello", ",", " "] {
            let frame = rx.recv().await.unwrap();
            assert_eq!(frame, OutboundFrame::token(expected));
            assert!(Instant::now() - last >= Duration::from_millis(10));
            last = Instant::now();
        }

        assert_eq!(rx.recv().await.unwrap().kind, FrameKind::Done);
        assert_eq!(Instant::now() - start, Duration::from_millis(40));
        task.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn pings_interleave_on_long_streams() {
        let (sink, mut rx) = FrameSink::channel(8);
        let options = StubOptions::from_request(Some(100.0), Some(200.0));
        let prompt = "word ".repeat(40);
        tokio::spawn(async move { stream_stub(&sink, &prompt, options).await });

        let mut kinds = Vec::new();
        while let Some(frame) = rx.recv().await {
            kinds.push(frame.kind);
        }

        let ping_at = kinds.iter().position(|k| *k == FrameKind::Ping).unwrap();
        // The first ping lands at 15 s, next to the 75th token.
        assert!((75..=76).contains(&ping_at), "first ping at frame {ping_at}");
        assert_eq!(kinds.iter().filter(|k| **k == FrameKind::Token).count(), 100);
        assert_eq!(kinds.last(), Some(&FrameKind::Done));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_stops_emission() {
        let (sink, mut rx) = FrameSink::channel(8);
        let options = StubOptions::from_request(None, Some(10.0));
        let task = tokio::spawn(async move { stream_stub(&sink, "a long prompt", options).await });

        assert_eq!(rx.recv().await.unwrap().kind, FrameKind::Meta);
        assert_eq!(rx.recv().await.unwrap().kind, FrameKind::Token);
        drop(rx);

        tokio::time::timeout(Duration::from_millis(50), task)
            .await
            .expect("stub kept running after disconnect")
            .unwrap();
    }
}
