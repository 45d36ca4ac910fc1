//! One-shot HTTP responder for adapter tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Serves a single canned response and yields the raw request head.
pub(crate) async fn serve_once(status_line: &'static str, body: &str) -> (Url, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|error| panic!("failed to bind test listener: {error}"));
    let address = listener
        .local_addr()
        .unwrap_or_else(|error| panic!("failed to read test listener address: {error}"));
    let response = format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener
            .accept()
            .await
            .unwrap_or_else(|error| panic!("test listener accept failed: {error}"));
        let mut buffer = vec![0_u8; 16 * 1024];
        let read = stream
            .read(&mut buffer)
            .await
            .unwrap_or_else(|error| panic!("test listener read failed: {error}"));
        stream
            .write_all(response.as_bytes())
            .await
            .unwrap_or_else(|error| panic!("test listener write failed: {error}"));
        let _ = stream.shutdown().await;

        String::from_utf8_lossy(&buffer[..read]).to_lowercase()
    });

    let url = Url::parse(format!("http://{address}/").as_str())
        .unwrap_or_else(|error| panic!("invalid test url: {error}"));
    (url, handle)
}

/// Address nothing listens on.
pub(crate) fn unreachable_url() -> Url {
    Url::parse("http://127.0.0.1:9/").unwrap_or_else(|error| panic!("invalid test url: {error}"))
}
