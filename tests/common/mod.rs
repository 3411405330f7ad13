//! Shared utilities for integration testing.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use status_proxy::config::ProxyConfig;
use status_proxy::filter::{IgnorePatternSet, PathFilter};
use status_proxy::{HttpServer, Shutdown};

/// What the mock upstream answers with.
#[derive(Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub chunks: Vec<Vec<u8>>,
    pub chunk_delay: Duration,
}

impl MockResponse {
    /// A gzip-encoded HTML page in one piece.
    pub fn gzip_html(status: u16, html: &[u8]) -> Self {
        Self {
            status,
            headers: vec![
                ("Content-Type", "text/html; charset=utf-8"),
                ("Content-Encoding", "gzip"),
                ("X-Powered-By", "Next.js"),
            ],
            chunks: vec![gzip(html)],
            chunk_delay: Duration::ZERO,
        }
    }
}

/// Request lines ("GET /path?query") seen by the mock upstream.
pub type SeenRequests = Arc<Mutex<Vec<String>>>;

/// Start a mock upstream that answers every connection with `response`.
pub async fn start_mock_upstream(response: MockResponse) -> (SocketAddr, SeenRequests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));

    let seen_by_task = seen.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let response = response.clone();
                    let seen = seen_by_task.clone();
                    tokio::spawn(async move {
                        let _ = serve_one(socket, response, seen).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen)
}

async fn serve_one(
    mut socket: TcpStream,
    response: MockResponse,
    seen: SeenRequests,
) -> std::io::Result<()> {
    let head = read_request_head(&mut socket).await?;
    if let Some(line) = head.lines().next() {
        let mut parts = line.split_whitespace();
        if let (Some(method), Some(target)) = (parts.next(), parts.next()) {
            seen.lock().unwrap().push(format!("{} {}", method, target));
        }
    }

    let content_length: usize = response.chunks.iter().map(Vec::len).sum();
    let mut head = format!("HTTP/1.1 {} Mock\r\n", response.status);
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", content_length));

    socket.write_all(head.as_bytes()).await?;
    for chunk in &response.chunks {
        socket.write_all(chunk).await?;
        socket.flush().await?;
        if !response.chunk_delay.is_zero() {
            tokio::time::sleep(response.chunk_delay).await;
        }
    }
    socket.shutdown().await
}

/// Read up to the blank line, then drain a declared request body.
async fn read_request_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        if socket.read(&mut byte).await? == 0 {
            break;
        }
        buf.push(byte[0]);
    }
    let head = String::from_utf8_lossy(&buf).to_string();

    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; content_length];
    socket.read_exact(&mut body).await?;

    Ok(head)
}

/// Start the proxy on an ephemeral port in front of `upstream`.
pub async fn start_proxy(upstream: SocketAddr, ignore_patterns: &str) -> (SocketAddr, Shutdown) {
    let mut config = ProxyConfig::default();
    config.upstream.target_url = format!("http://{}", upstream);
    let filter = PathFilter::new(IgnorePatternSet::parse(ignore_patterns));
    start_proxy_with(config, Some(filter)).await
}

/// Start the proxy with a full config; `None` loads the configured ignore file.
#[allow(dead_code)]
pub async fn start_proxy_with(
    mut config: ProxyConfig,
    filter: Option<PathFilter>,
) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let server = match filter {
        Some(filter) => HttpServer::with_filter(config, filter).unwrap(),
        None => HttpServer::new(config).unwrap(),
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Gzip `parts` as one stream, cut after each part (sync flush) plus the trailer.
#[allow(dead_code)]
pub fn gzip_parts(parts: &[&[u8]]) -> Vec<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut chunks = Vec::new();
    for part in parts {
        encoder.write_all(part).unwrap();
        encoder.flush().unwrap();
        chunks.push(std::mem::take(encoder.get_mut()));
    }
    encoder.try_finish().unwrap();
    chunks.push(std::mem::take(encoder.get_mut()));
    chunks
}

#[allow(dead_code)]
pub fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}
