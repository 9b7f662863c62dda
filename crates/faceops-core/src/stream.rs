//! Incremental decoder for the bulk registration progress stream.
//!
//! The server answers `POST /users/register/bulk` with an event stream:
//! frames of `data: <json>` lines separated by a blank line. Reads from the
//! transport may end anywhere, including inside a UTF-8 sequence or a frame
//! separator, so the decoder buffers until a frame is complete.

use crate::types::BulkStreamEvent;
use thiserror::Error;

const FRAME_SEPARATOR: &str = "\n\n";
const DATA_FIELD: &str = "data:";

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("malformed frame payload {payload:?}: {source}")]
    Malformed {
        payload: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Reassembles transport chunks into [`BulkStreamEvent`]s.
///
/// One decoder per stream; feed chunks in arrival order with
/// [`push`](Self::push) and call [`finish`](Self::finish) at end of data.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a frame separator.
    buffer: String,
    frames_seen: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of complete frames consumed so far (including ignored ones).
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Feed one chunk and return every event completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<BulkStreamEvent>, FrameError> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut events = Vec::new();
        while let Some(idx) = self.buffer.find(FRAME_SEPARATOR) {
            let frame: String = self.buffer.drain(..idx + FRAME_SEPARATOR.len()).collect();
            self.frames_seen += 1;
            if let Some(event) = parse_frame(&frame[..idx])? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Flush at end of stream.
    ///
    /// A final frame without its trailing blank line is decoded when it
    /// parses. One that does not parse was cut off mid-frame and is dropped;
    /// it never invalidates events already returned. Dangling partial UTF-8
    /// becomes U+FFFD.
    pub fn finish(&mut self) -> Vec<BulkStreamEvent> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            return Vec::new();
        }
        match parse_frame(&rest) {
            Ok(event) => {
                tracing::debug!(len = rest.len(), "decoded unterminated trailing frame");
                self.frames_seen += 1;
                event.into_iter().collect()
            }
            Err(e) => {
                tracing::debug!(len = rest.len(), error = %e, "dropping truncated trailing frame");
                Vec::new()
            }
        }
    }

    /// Move every complete UTF-8 prefix of `pending` into `buffer`.
    /// Invalid sequences are replaced with U+FFFD; an incomplete sequence at
    /// the end is kept for the next chunk.
    fn decode_pending(&mut self) {
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = consumed + e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[consumed..valid]) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid + bad;
                        }
                        None => {
                            consumed = valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }
}

/// Parse one frame body (without its separator).
///
/// Multiple `data:` lines are joined with newlines. Other fields (`event:`,
/// `id:`, comments) are ignored, as are frames without any data.
pub fn parse_frame(frame: &str) -> Result<Option<BulkStreamEvent>, FrameError> {
    let mut payload: Option<String> = None;
    for line in frame.lines() {
        let Some(value) = line.trim_start().strip_prefix(DATA_FIELD) else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match payload.as_mut() {
            Some(p) => {
                p.push('\n');
                p.push_str(value);
            }
            None => payload = Some(value.to_string()),
        }
    }

    let Some(payload) = payload.filter(|p| !p.trim().is_empty()) else {
        return Ok(None);
    };

    serde_json::from_str(&payload)
        .map(Some)
        .map_err(|source| FrameError::Malformed { payload, source })
}
