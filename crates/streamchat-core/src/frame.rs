//! Decoding of the chat endpoint's streaming body.
//!
//! The body is a sequence of newline-delimited lines. Lines starting with
//! `data: ` carry one JSON-encoded [`StreamFrame`]; everything else (blank
//! separators, `event:` fields, comments) is ignored. The transport may cut
//! the body anywhere, so [`FrameDecoder`] keeps the trailing partial line
//! until the rest of it arrives.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const FRAME_PREFIX: &str = "data: ";

/// One server-sent event frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    Start,
    Content { text: String },
    End { full_text: String },
    Error { message: String },
}

impl StreamFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamFrame::Start => "start",
            StreamFrame::Content { .. } => "content",
            StreamFrame::End { .. } => "end",
            StreamFrame::Error { .. } => "error",
        }
    }

    /// Encode as a single `data: ...` line, terminated by a blank line.
    pub fn to_event_line(&self) -> String {
        // Serializing a plain enum of strings cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("{FRAME_PREFIX}{json}\n\n")
    }
}

/// Parse one complete line. `None` for lines that carry no frame.
pub fn parse_line(line: &str) -> Option<Result<StreamFrame, serde_json::Error>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(FRAME_PREFIX)?;
    Some(serde_json::from_str(payload))
}

/// Incremental line splitter and frame parser.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    skipped: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read; returns the frames completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.buf[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + pos;
            let line = String::from_utf8_lossy(&self.buf[consumed..end]).into_owned();
            consumed = end + 1;
            self.decode_into(&line, &mut frames);
        }
        self.buf.drain(..consumed);

        frames
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        if !self.buf.is_empty() {
            let line = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            self.decode_into(&line, &mut frames);
        }
        frames
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Number of `data:` lines dropped because they did not parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode_into(&mut self, line: &str, frames: &mut Vec<StreamFrame>) {
        match parse_line(line) {
            Some(Ok(frame)) => {
                debug!(kind = frame.kind(), "decoded frame");
                frames.push(frame);
            }
            Some(Err(e)) => {
                self.skipped += 1;
                warn!(error = %e, line = %line, "skipping malformed frame");
            }
            None => {}
        }
    }
}
