//! Per-request SSE plumbing.
//!
//! A draft request writes [`OutboundFrame`]s into a bounded channel; the
//! receiving half becomes the response body. The sink's cancellation token
//! fires when the client goes away (the body is dropped) or when the sender
//! side finishes, whichever comes first.

use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use futures_util::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use usbllm_core::OutboundFrame;

/// Frames buffered per request before the producer waits on the client.
pub const FRAME_BUFFER: usize = 32;

/// Write half of one SSE response.
#[derive(Debug)]
pub struct FrameSink {
    tx: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
}

impl FrameSink {
    /// Create a sink and the receiver that feeds the response body.
    ///
    /// Must be called inside a tokio runtime: a watcher task trips the token
    /// once the receiver is dropped.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();

        let watcher_tx = tx.clone();
        let watcher_cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = watcher_tx.closed() => {
                    debug!("SSE client disconnected");
                    watcher_cancel.cancel();
                }
                () = watcher_cancel.cancelled() => {}
            }
        });

        (Self { tx, cancel }, rx)
    }

    /// Queue a frame. Returns `false` once the client is gone.
    pub async fn send(&self, frame: OutboundFrame) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.tx.send(frame) => sent.is_ok(),
        }
    }

    /// Token tripped on disconnect or close.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Finish the response: no more frames will be sent.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for FrameSink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Encode one frame as an SSE event: `event: <kind>` plus its JSON payload.
pub fn to_event(frame: &OutboundFrame) -> Event {
    Event::default()
        .event(frame.kind.as_str())
        .data(frame.data.to_string())
}

/// Response body streaming every frame received on `rx`.
pub fn sse_response(
    rx: mpsc::Receiver<OutboundFrame>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let stream = ReceiverStream::new(rx).map(|frame| Ok(to_event(&frame)));
    Sse::new(stream)
}
