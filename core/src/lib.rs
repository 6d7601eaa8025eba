//! Hand-rolled HTTP/1.1-over-TLS client for a single fixed
//! GET-with-payload endpoint.
//!
//! # Overview
//! Sends one GET request whose body carries a JSON payload (non-standard
//! but accepted by the target server) and reassembles the raw socket
//! response without a general-purpose HTTP library: exact status-line
//! check, header skip, and heuristic removal of chunked-transfer size
//! markers.
//!
//! # Design
//! - `client` builds the fixed request preamble once per client and
//!   exposes the one public operation, [`PayloadClient::exchange`].
//! - `transport` owns TLS setup and request writing; one connection per
//!   exchange, dropped on every exit path.
//! - `framer` turns the raw line stream into a decodable body string;
//!   its parse state is pure and testable without I/O.
//! - `error` gives each failure kind its own variant so callers can
//!   pattern-match instead of reading message text.

pub mod client;
pub mod error;
pub mod framer;
pub mod transport;

pub use client::{Endpoint, PayloadClient};
pub use error::ExchangeError;
pub use framer::{is_chunk_size_marker, ResponseFramer};
pub use transport::TlsTransport;
