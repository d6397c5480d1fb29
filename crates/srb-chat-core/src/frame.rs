//! Server-sent event frame decoding.
//!
//! The streaming endpoint answers with newline-delimited lines of the form
//! `data: {json}`. Network reads do not respect line boundaries, so the
//! decoder keeps the unterminated tail of each read and only decodes a line
//! once its newline has arrived.

use serde::{Deserialize, Serialize};

/// Prefix carried by every event line.
pub const DATA_PREFIX: &str = "data: ";

/// One decoded event from the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Text fragment to append to the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
    /// Terminal signal.
    #[serde(default)]
    pub done: bool,
    /// Backend-reported failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a frame asks the consumer to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAction {
    /// Append text to the accumulator.
    Chunk(String),
    /// The reply is complete.
    Done,
    /// The backend reported an error.
    Error(String),
    /// Nothing to do.
    Ignore,
}

impl Frame {
    /// Classify the frame.
    ///
    /// An error wins over everything else. A chunk is only applied on a
    /// frame that is not also the terminal one; empty strings count as
    /// absent.
    #[must_use]
    pub fn action(self) -> FrameAction {
        if let Some(error) = self.error.filter(|e| !e.is_empty()) {
            return FrameAction::Error(error);
        }
        if !self.done {
            if let Some(chunk) = self.chunk.filter(|c| !c.is_empty()) {
                return FrameAction::Chunk(chunk);
            }
        }
        if self.done {
            FrameAction::Done
        } else {
            FrameAction::Ignore
        }
    }
}

/// Parse a single line into a frame.
///
/// Returns `None` for lines without the `data: ` prefix, with an empty
/// payload, or whose payload is not a JSON object of the expected shape.
#[must_use]
pub fn parse_line(line: &str) -> Option<Frame> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }
    match serde_json::from_str::<Frame>(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(error = %e, line = %line, "Skipping malformed frame");
            None
        }
    }
}

/// Incremental line splitter and frame parser.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read and return every frame it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(frame) = decode_line(&self.pending[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.pending.drain(..start);
        frames
    }

    /// Flush the unterminated tail once the body has ended.
    pub fn finish(&mut self) -> Option<Frame> {
        let tail = std::mem::take(&mut self.pending);
        decode_line(&tail)
    }

    /// Number of buffered bytes waiting for a newline.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> Option<Frame> {
    if bytes.is_empty() {
        return None;
    }
    parse_line(&String::from_utf8_lossy(bytes))
}
