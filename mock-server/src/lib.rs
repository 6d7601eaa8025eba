//! Scripted TLS responder for exercising the exchange client.
//!
//! # Design
//! The client under test frames responses off the raw byte stream, so the
//! server must control those bytes exactly: status-line variants, header
//! blocks, interleaved chunk-size lines, missing bodies. Each connection
//! is answered with a pre-baked byte script written verbatim once the
//! request has been read; nothing here interprets HTTP beyond locating
//! the end of the request. Certificates are generated per identity with
//! rcgen so tests can trust the server through a custom root store.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{RootCertStore, ServerConfig, ServerConnection, StreamOwned};
use tracing::debug;

/// Self-signed TLS material for one server instance.
pub struct TlsIdentity {
    config: Arc<ServerConfig>,
    roots: RootCertStore,
    ca_pem: String,
}

impl TlsIdentity {
    /// Generate a fresh certificate for `localhost` together with a root
    /// store that trusts it.
    pub fn generate() -> Result<Self, Box<dyn std::error::Error>> {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
        let cert_der = certified.cert.der().clone();
        let key_der = PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());

        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der.clone()], PrivateKeyDer::Pkcs8(key_der))?;

        let mut roots = RootCertStore::empty();
        roots.add(cert_der)?;

        Ok(Self {
            config: Arc::new(config),
            roots,
            ca_pem: certified.cert.pem(),
        })
    }

    /// Root store containing exactly this server's certificate.
    pub fn root_store(&self) -> RootCertStore {
        self.roots.clone()
    }

    /// The certificate in PEM form, for clients outside this process.
    pub fn ca_pem(&self) -> &str {
        &self.ca_pem
    }
}

/// A background TLS server answering one connection per script.
pub struct MockServer {
    addr: SocketAddr,
    requests: mpsc::Receiver<Vec<u8>>,
}

impl MockServer {
    /// Bind a random loopback port and serve `scripts.len()` connections
    /// on a background thread, writing each script verbatim as the
    /// response. The raw bytes of every received request are recorded.
    pub fn start(identity: &TlsIdentity, scripts: Vec<Vec<u8>>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let config = Arc::clone(&identity.config);
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for script in scripts {
                let (tcp, peer) = match listener.accept() {
                    Ok(conn) => conn,
                    Err(e) => {
                        debug!(error = %e, "accept failed, stopping");
                        return;
                    }
                };
                debug!(%peer, "connection accepted");
                if let Err(e) = serve_connection(&config, tcp, &script, &tx) {
                    debug!(error = %e, "connection aborted");
                }
            }
        });

        Ok(Self { addr, requests: rx })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Raw bytes of the next recorded request, if one arrives in time.
    pub fn recv_request(&self) -> Option<Vec<u8>> {
        self.requests.recv_timeout(Duration::from_secs(5)).ok()
    }
}

/// Serve `script` to every connection, forever. Used by the standalone
/// binary; tests use [`MockServer::start`].
pub fn run(listener: TcpListener, identity: &TlsIdentity, script: Vec<u8>) -> io::Result<()> {
    let (tx, _rx) = mpsc::channel();
    loop {
        let (tcp, peer) = listener.accept()?;
        debug!(%peer, "connection accepted");
        if let Err(e) = serve_connection(&identity.config, tcp, &script, &tx) {
            debug!(error = %e, "connection aborted");
        }
    }
}

fn serve_connection(
    config: &Arc<ServerConfig>,
    tcp: TcpStream,
    script: &[u8],
    tx: &mpsc::Sender<Vec<u8>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let conn = ServerConnection::new(Arc::clone(config))?;
    let mut stream = StreamOwned::new(conn, tcp);

    let request = read_request(&mut stream)?;
    let _ = tx.send(request);

    stream.write_all(script)?;
    stream.flush()?;

    // Close-notify so the client observes a clean end of stream.
    stream.conn.send_close_notify();
    while stream.conn.wants_write() {
        stream.conn.write_tls(&mut stream.sock)?;
    }
    Ok(())
}

/// Read one request: headers through the blank separator line, then a
/// body of `Content-Length` bytes plus the line terminator the client
/// appends after it.
fn read_request<R: Read>(stream: &mut R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(header_end) = find_subsequence(&buf, b"\r\n\r\n") {
            let body_len = content_length(&buf[..header_end]).unwrap_or(0);
            let mut want = header_end + 4 + body_len;
            if body_len > 0 {
                want += 2;
            }
            if buf.len() >= want {
                buf.truncate(want);
                return Ok(buf);
            }
        }
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Ok(buf);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn content_length(headers: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(headers).ok()?;
    text.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_parses_the_header() {
        let headers = b"GET /api HTTP/1.1\r\nContent-Length: 42\r\nAccept: */*";
        assert_eq!(content_length(headers), Some(42));
    }

    #[test]
    fn content_length_is_case_insensitive() {
        assert_eq!(content_length(b"content-LENGTH: 7"), Some(7));
    }

    #[test]
    fn content_length_missing_is_none() {
        assert_eq!(content_length(b"GET /api HTTP/1.1\r\nAccept: */*"), None);
    }

    #[test]
    fn find_subsequence_locates_header_end() {
        assert_eq!(find_subsequence(b"ab\r\n\r\ncd", b"\r\n\r\n"), Some(2));
        assert_eq!(find_subsequence(b"abcd", b"\r\n\r\n"), None);
    }

    #[test]
    fn identity_root_store_is_nonempty() {
        let identity = TlsIdentity::generate().unwrap();
        assert!(!identity.root_store().is_empty());
        assert!(identity.ca_pem().contains("BEGIN CERTIFICATE"));
    }
}
