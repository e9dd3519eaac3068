//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; a frame is complete once a blank line is
//! seen. Only `data:` lines are kept. Comments (`:`), `event:`/`id:` fields
//! and keep-alive blank lines carry nothing the relay needs.
//!
//! Lines are split on raw bytes before UTF-8 decoding, so a multi-byte
//! character split across two chunks is never mangled.

use bytes::BytesMut;

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    /// `data:` payloads of the frame being assembled.
    data: Vec<String>,
    eof: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Mark the end of the body. A trailing frame without its blank line is
    /// still returned by [`Self::next_frame`].
    pub const fn finish(&mut self) {
        self.eof = true;
    }

    /// Next complete frame as its list of non-empty `data:` payloads.
    pub fn next_frame(&mut self) -> Option<Vec<String>> {
        while let Some(newline) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(newline + 1);
            if let Some(frame) = self.accept_line(&line[..newline]) {
                return Some(frame);
            }
        }

        if self.eof {
            if !self.buf.is_empty() {
                let rest = self.buf.split();
                if let Some(frame) = self.accept_line(&rest[..]) {
                    return Some(frame);
                }
            }
            if !self.data.is_empty() {
                return Some(std::mem::take(&mut self.data));
            }
        }

        None
    }

    fn accept_line(&mut self, raw: &[u8]) -> Option<Vec<String>> {
        let line = String::from_utf8_lossy(raw);
        let line = line.strip_suffix('\r').unwrap_or(&line);

        if line.trim().is_empty() {
            if self.data.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.data));
        }

        if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.trim();
            if !payload.is_empty() {
                self.data.push(payload.to_string());
            }
        }
        None
    }
}
