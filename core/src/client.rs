//! Fixed-endpoint exchange client: one GET-with-payload round trip per
//! call.
//!
//! # Design
//! `PayloadClient` is built once from an [`Endpoint`] and keeps the fixed
//! request preamble as immutable bytes, so repeated exchanges skip the
//! header construction. Each `exchange` serializes the payload, opens its
//! own TLS connection, writes the request, frames the response, and
//! decodes the body, failing fast at every step; the connection is owned
//! by the call scope and dropped on every exit path. The JSON codec is
//! `serde_json`, treated as a black box.

use std::io::BufReader;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExchangeError;
use crate::framer;
use crate::transport::{self, TlsTransport};

pub(crate) const LINE_END: &str = "\r\n";

const USER_AGENT: &str = concat!("getpayload/", env!("CARGO_PKG_VERSION"));

/// Where requests go. Fixed at client construction, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub resource_path: String,
}

impl Endpoint {
    pub fn new(host: &str, port: u16, resource_path: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            resource_path: resource_path.to_string(),
        }
    }
}

/// Client for a single fixed GET-with-payload endpoint.
///
/// Holds only immutable state (endpoint, prebuilt preamble, shared TLS
/// config), so one client can be shared across threads; every call to
/// [`exchange`](PayloadClient::exchange) opens and discards its own
/// connection.
#[derive(Clone)]
pub struct PayloadClient {
    endpoint: Endpoint,
    preamble: Vec<u8>,
    transport: TlsTransport,
}

impl PayloadClient {
    /// Client trusting the bundled webpki root certificates.
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_transport(endpoint, TlsTransport::new())
    }

    /// Client trusting a caller-supplied root store (private CAs, tests).
    pub fn with_root_store(endpoint: Endpoint, roots: rustls::RootCertStore) -> Self {
        Self::with_transport(endpoint, TlsTransport::with_root_store(roots))
    }

    fn with_transport(endpoint: Endpoint, transport: TlsTransport) -> Self {
        let preamble = build_preamble(&endpoint.resource_path);
        Self {
            endpoint,
            preamble,
            transport,
        }
    }

    /// Serialize `payload`, perform one GET-with-payload exchange against
    /// the fixed endpoint, and decode the extracted response body.
    ///
    /// One connection per call, closed on every exit path, no retries.
    pub fn exchange<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Value, ExchangeError> {
        let body = serde_json::to_string(payload).map_err(|e| ExchangeError::Encoding(e.to_string()))?;

        let mut stream = self.transport.open(&self.endpoint.host, self.endpoint.port)?;
        transport::send_request(&mut stream, &self.preamble, body.as_bytes())?;

        let text = framer::read_response(BufReader::new(stream))?;
        serde_json::from_str(&text).map_err(|e| ExchangeError::Decoding(e.to_string()))
    }

    /// The fixed header block written ahead of every request.
    pub fn preamble(&self) -> &[u8] {
        &self.preamble
    }
}

/// `GET <path> HTTP/1.1` plus the static headers, CRLF line endings, no
/// terminating blank line (`Content-Length` is appended per exchange).
fn build_preamble(resource_path: &str) -> Vec<u8> {
    format!(
        "GET {resource_path} HTTP/1.1{LINE_END}\
         User-Agent: {USER_AGENT}{LINE_END}\
         Content-Type: application/json;charset=utf-8{LINE_END}\
         Accept: application/json;charset=utf-8{LINE_END}"
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn preamble_is_the_fixed_header_block() {
        let client = PayloadClient::new(Endpoint::new("example.com", 443, "/get/api/path"));
        let expected = format!(
            "GET /get/api/path HTTP/1.1\r\n\
             User-Agent: getpayload/{}\r\n\
             Content-Type: application/json;charset=utf-8\r\n\
             Accept: application/json;charset=utf-8\r\n",
            env!("CARGO_PKG_VERSION")
        );
        assert_eq!(client.preamble(), expected.as_bytes());
    }

    #[test]
    fn preamble_is_stable_across_clones() {
        let client = PayloadClient::new(Endpoint::new("example.com", 443, "/api"));
        assert_eq!(client.preamble(), client.clone().preamble());
    }

    #[test]
    fn endpoint_deserializes_from_config_json() {
        let endpoint: Endpoint = serde_json::from_str(
            r#"{"host":"api.example.com","port":8443,"resource_path":"/v1/report"}"#,
        )
        .unwrap();
        assert_eq!(endpoint, Endpoint::new("api.example.com", 8443, "/v1/report"));
    }

    #[test]
    fn unserializable_payload_fails_before_connecting() {
        // serde_json rejects maps with non-string keys; no socket is
        // opened for port 1 on a host that resolves nowhere.
        let client = PayloadClient::new(Endpoint::new("host.invalid", 1, "/api"));
        let mut payload = HashMap::new();
        payload.insert((1u8, 2u8), "value");

        let err = client.exchange(&payload).unwrap_err();
        assert!(matches!(err, ExchangeError::Encoding(_)));
    }

    #[test]
    fn codec_round_trips_representative_payloads() {
        for payload in [
            json!({"query": "status", "depth": 3}),
            json!(["a", 1, null, true]),
            json!("Zürich"),
            json!(42),
        ] {
            let text = serde_json::to_string(&payload).unwrap();
            let back: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(back, payload);
        }
    }
}
