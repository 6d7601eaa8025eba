//! Error types for the payload exchange client.
//!
//! # Design
//! One variant per failure kind so callers can match on what went wrong
//! (connection problem vs protocol problem vs empty result) instead of
//! inspecting message text. Setup failures are deliberately coarse: DNS
//! lookup, refused connections, handshake and certificate problems all
//! land in `Connection` undistinguished.

use std::fmt;

/// Errors returned by [`PayloadClient::exchange`](crate::PayloadClient::exchange).
#[derive(Debug)]
pub enum ExchangeError {
    /// TCP connect or TLS handshake failed before any request bytes were
    /// written.
    Connection(String),

    /// Writing the request, or reading mid-response, failed after the
    /// connection was established.
    Transport(String),

    /// The status line was not exactly `HTTP/1.1 200 OK`. Carries the
    /// observed line, empty if the server closed without sending one.
    UnexpectedStatus(String),

    /// Filtering and trimming the response stream left no body to decode.
    EmptyBody,

    /// The request payload could not be serialized to JSON.
    Encoding(String),

    /// The extracted response body could not be deserialized from JSON.
    Decoding(String),
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::Connection(msg) => {
                write!(f, "connection failed: {msg}")
            }
            ExchangeError::Transport(msg) => {
                write!(f, "transport failed: {msg}")
            }
            ExchangeError::UnexpectedStatus(status) => {
                write!(f, "request failed, status: {status}")
            }
            ExchangeError::EmptyBody => {
                write!(f, "no response body found in socket response")
            }
            ExchangeError::Encoding(msg) => {
                write!(f, "payload serialization failed: {msg}")
            }
            ExchangeError::Decoding(msg) => {
                write!(f, "response deserialization failed: {msg}")
            }
        }
    }
}

impl std::error::Error for ExchangeError {}
