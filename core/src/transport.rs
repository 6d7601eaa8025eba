//! TLS transport for a single request/response exchange.
//!
//! # Design
//! One socket per exchange, owned by the calling scope: dropping the
//! stream closes the connection, which is how every exit path (success,
//! status failure, parse failure) releases its resources. The handshake
//! runs eagerly inside [`TlsTransport::open`], so DNS, refused-connection,
//! handshake, and certificate failures all surface as
//! [`ExchangeError::Connection`] before a single request byte is written.

use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::client::LINE_END;
use crate::error::ExchangeError;

/// A TLS connection used for exactly one exchange.
pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Factory for per-exchange TLS connections.
///
/// Holds only the shared client config; cloning is cheap and concurrent
/// use from multiple threads is fine, each exchange gets its own socket.
#[derive(Clone)]
pub struct TlsTransport {
    config: Arc<ClientConfig>,
}

impl TlsTransport {
    /// Transport trusting the bundled webpki root certificates.
    pub fn new() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_root_store(roots)
    }

    /// Transport trusting a caller-supplied root store.
    pub fn with_root_store(roots: RootCertStore) -> Self {
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            config: Arc::new(config),
        }
    }

    /// Open a TCP connection to `host:port` and complete the TLS
    /// handshake before returning the stream.
    pub fn open(&self, host: &str, port: u16) -> Result<TlsStream, ExchangeError> {
        let server_name = ServerName::try_from(host.to_string()).map_err(connection_err)?;
        let conn =
            ClientConnection::new(Arc::clone(&self.config), server_name).map_err(connection_err)?;
        let tcp = TcpStream::connect((host, port)).map_err(connection_err)?;

        let mut stream = StreamOwned::new(conn, tcp);
        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(connection_err)?;
        }
        Ok(stream)
    }
}

fn connection_err(e: impl std::fmt::Display) -> ExchangeError {
    ExchangeError::Connection(e.to_string())
}

impl Default for TlsTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Write one request to `writer`: the fixed preamble, a `Content-Length`
/// header computed from the exact byte length of `body`, the blank line
/// ending the headers, and the body followed by a line terminator.
pub fn send_request<W: Write>(
    writer: &mut W,
    preamble: &[u8],
    body: &[u8],
) -> Result<(), ExchangeError> {
    let transport_err = |e: std::io::Error| ExchangeError::Transport(e.to_string());

    writer.write_all(preamble).map_err(transport_err)?;
    writer
        .write_all(format!("Content-Length: {}{LINE_END}", body.len()).as_bytes())
        .map_err(transport_err)?;
    writer.write_all(LINE_END.as_bytes()).map_err(transport_err)?;
    writer.write_all(body).map_err(transport_err)?;
    writer.write_all(LINE_END.as_bytes()).map_err(transport_err)?;
    writer.flush().map_err(transport_err)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn send_request_declares_exact_byte_length() {
        // Two-byte UTF-8 characters make byte length and char count differ.
        let body = "{\"city\":\"Zürich\"}";
        assert_ne!(body.len(), body.chars().count());

        let mut sink = Vec::new();
        send_request(&mut sink, b"GET /api HTTP/1.1\r\n", body.as_bytes()).unwrap();

        let written = String::from_utf8(sink).unwrap();
        assert!(written.contains(&format!("Content-Length: {}\r\n", body.len())));
    }

    #[test]
    fn send_request_orders_preamble_headers_and_body() {
        let mut sink = Vec::new();
        send_request(&mut sink, b"GET /api HTTP/1.1\r\nAccept: application/json\r\n", b"{}")
            .unwrap();

        let written = String::from_utf8(sink).unwrap();
        assert_eq!(
            written,
            "GET /api HTTP/1.1\r\n\
             Accept: application/json\r\n\
             Content-Length: 2\r\n\
             \r\n\
             {}\r\n"
        );
    }

    #[test]
    fn send_request_surfaces_write_failures_as_transport() {
        struct FailingWriter;

        impl Write for FailingWriter {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let err = send_request(&mut FailingWriter, b"GET / HTTP/1.1\r\n", b"{}").unwrap_err();
        assert!(matches!(err, ExchangeError::Transport(_)));
    }

    #[test]
    fn open_rejects_invalid_server_names_without_connecting() {
        let err = TlsTransport::new().open("not a hostname", 443).unwrap_err();
        assert!(matches!(err, ExchangeError::Connection(_)));
    }

    #[test]
    fn open_maps_refused_connections_to_connection_error() {
        // Bind then drop to get a loopback port with no listener behind it.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = TlsTransport::new().open("localhost", port).unwrap_err();
        assert!(matches!(err, ExchangeError::Connection(_)));
    }
}
