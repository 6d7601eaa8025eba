//! Response framing: status-line validation, header/body separation, and
//! chunk-size marker filtering.
//!
//! # Design
//! The filter is a heuristic, not a chunked-transfer state machine: once
//! the blank line ending the headers has been seen, any line of at most
//! four hexadecimal digits is treated as a chunk-size marker and dropped.
//! The parse state lives in [`ResponseFramer`] (a headers-done flag and
//! two buffers), so the step is pure, testable without I/O, and can be
//! replaced with a real chunked decoder without touching the transport.
//!
//! Known limitations, kept as-is:
//! - chunk sizes of five or more hex digits pass through as body content;
//! - chunk-extension syntax (`1a;name=value`) is not recognized;
//! - a short all-hex body line in a non-chunked response (say a bare
//!   `123` on its own line) is misclassified and dropped.

use std::io::{self, BufRead};

use tracing::debug;

use crate::error::ExchangeError;

/// The only status line accepted, byte for byte.
pub const STATUS_OK: &str = "HTTP/1.1 200 OK";

/// Longest line still checked against the hex pattern. Four digits cover
/// chunk sizes up to 0xffff; longer lines skip the match entirely.
const MARKER_MAX_LEN: usize = 4;

/// True if `line` reads as a chunk-size marker: one to four ASCII hex
/// digits and nothing else.
pub fn is_chunk_size_marker(line: &str) -> bool {
    !line.is_empty()
        && line.len() <= MARKER_MAX_LEN
        && line.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parse state for a single response: headers accumulate until the blank
/// separator line, then body lines are filtered and concatenated.
#[derive(Debug, Default)]
pub struct ResponseFramer {
    headers_done: bool,
    headers: String,
    body: String,
}

impl ResponseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one line, its terminator already stripped.
    pub fn feed_line(&mut self, line: &str) {
        if !self.headers_done {
            self.headers.push_str(line);
            if line.is_empty() {
                self.headers_done = true;
                debug!(headers = %self.headers, "response headers received");
            }
        }
        // The blank separator itself falls through here and appends
        // nothing; from then on every line is body or marker.
        if self.headers_done {
            if is_chunk_size_marker(line) {
                return;
            }
            self.body.push_str(line);
        }
    }

    /// The trimmed body, or `EmptyBody` if filtering left nothing behind.
    pub fn finish(self) -> Result<String, ExchangeError> {
        let body = self.body.trim().to_string();
        if body.is_empty() {
            return Err(ExchangeError::EmptyBody);
        }
        Ok(body)
    }
}

/// Read one full response from `reader`: validate the status line, then
/// feed every remaining line to a [`ResponseFramer`] until the stream
/// ends, and return the extracted body.
///
/// A peer that closes the connection without a TLS close-notify surfaces
/// as `UnexpectedEof`; that is treated as end of stream and the framer
/// judges whether a body was received. Any other read failure aborts with
/// [`ExchangeError::Transport`].
pub fn read_response<R: BufRead>(reader: R) -> Result<String, ExchangeError> {
    let mut lines = reader.lines();

    let status = match lines.next() {
        Some(Ok(line)) => line,
        Some(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => String::new(),
        Some(Err(e)) => return Err(ExchangeError::Transport(e.to_string())),
        None => String::new(),
    };
    if status != STATUS_OK {
        return Err(ExchangeError::UnexpectedStatus(status));
    }

    let mut framer = ResponseFramer::new();
    for line in lines {
        match line {
            Ok(line) => framer.feed_line(&line),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(ExchangeError::Transport(e.to_string())),
        }
    }
    framer.finish()
}
