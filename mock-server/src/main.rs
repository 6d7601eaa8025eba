use std::net::TcpListener;

use mock_server::TlsIdentity;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");

    let identity = TlsIdentity::generate()?;
    let ca_path = std::env::temp_dir().join("mock-server-ca.pem");
    std::fs::write(&ca_path, identity.ca_pem())?;

    let response = b"HTTP/1.1 200 OK\r\n\
        Content-Type: application/json;charset=utf-8\r\n\
        Transfer-Encoding: chunked\r\n\
        \r\n\
        f\r\n\
        {\"status\":\"ok\"}\r\n\
        0\r\n\
        \r\n"
        .to_vec();

    let listener = TcpListener::bind(&addr)?;
    println!("listening on {addr} (CA certificate: {})", ca_path.display());
    Ok(mock_server::run(listener, &identity, response)?)
}
