//! End-to-end tests for traffic the proxy must leave untouched.

use reqwest::StatusCode;
use tokio::net::TcpListener;

mod common;
use common::{client, gzip, start_mock_upstream, start_proxy, MockResponse};

const STATUS_PAGE: &[u8] = br#"<html><head><meta name="app:status" content="503"></head></html>"#;

#[tokio::test]
async fn test_ignored_path_is_byte_identical() {
    let (upstream, _) = start_mock_upstream(MockResponse::gzip_html(200, STATUS_PAGE)).await;
    let (proxy, shutdown) = start_proxy(upstream, "^/status-page$").await;

    let res = client()
        .get(format!("http://{}/status-page", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-encoding"], "gzip");
    assert_eq!(res.bytes().await.unwrap(), gzip(STATUS_PAGE));

    shutdown.trigger();
}

#[tokio::test]
async fn test_post_is_forwarded_untouched() {
    let (upstream, seen) = start_mock_upstream(MockResponse::gzip_html(200, STATUS_PAGE)).await;
    let (proxy, shutdown) = start_proxy(upstream, "").await;

    let res = client()
        .post(format!("http://{}/form?x=1", proxy))
        .body("name=value")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await.unwrap(), gzip(STATUS_PAGE));
    assert_eq!(seen.lock().unwrap().as_slice(), ["POST /form?x=1"]);

    shutdown.trigger();
}

#[tokio::test]
async fn test_uncompressed_html_passes_through() {
    let response = MockResponse {
        status: 200,
        headers: vec![("Content-Type", "text/html")],
        chunks: vec![STATUS_PAGE.to_vec()],
        chunk_delay: std::time::Duration::ZERO,
    };
    let (upstream, _) = start_mock_upstream(response).await;
    let (proxy, shutdown) = start_proxy(upstream, "").await;

    let res = client().get(format!("http://{}/plain", proxy)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["content-length"],
        STATUS_PAGE.len().to_string().as_str()
    );
    assert_eq!(res.bytes().await.unwrap(), STATUS_PAGE);

    shutdown.trigger();
}

#[tokio::test]
async fn test_gzip_json_passes_through() {
    let json = br#"{"status":"app:status"}"#;
    let mut response = MockResponse::gzip_html(202, json);
    response.headers[0] = ("Content-Type", "application/json");
    let (upstream, _) = start_mock_upstream(response).await;
    let (proxy, shutdown) = start_proxy(upstream, "").await;

    let res = client().get(format!("http://{}/api/data", proxy)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(res.bytes().await.unwrap(), gzip(json));

    shutdown.trigger();
}

#[tokio::test]
async fn test_query_string_reaches_upstream() {
    let (upstream, seen) = start_mock_upstream(MockResponse::gzip_html(200, STATUS_PAGE)).await;
    let (proxy, shutdown) = start_proxy(upstream, "").await;

    let res = client()
        .get(format!("http://{}/search?q=rust&page=2", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(seen.lock().unwrap().as_slice(), ["GET /search?q=rust&page=2"]);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_returns_bad_gateway() {
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = closed.local_addr().unwrap();
    drop(closed);

    let (proxy, shutdown) = start_proxy(upstream, "").await;

    let res = client().get(format!("http://{}/", proxy)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}
