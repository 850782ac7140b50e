//! Integration tests for the HTTP client and retry loop against a mock server.

use std::time::Duration;

use podcatcher::download::{FetchError, HttpClient, RateLimiter, RetryPolicy, with_retry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::{
    should_skip_socket_bound_test, socket_skip_return, start_mock_server_or_skip,
};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

#[tokio::test]
async fn test_fetch_bytes_preserves_content() {
    let mock_server = require_mock_server!();
    let content = b"<rss version=\"2.0\"><channel></channel></rss>";
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let body = client
        .fetch_bytes(&format!("{}/feed.xml", mock_server.uri()))
        .await
        .expect("fetch should succeed");
    assert_eq!(body, content);
}

#[tokio::test]
async fn test_fetch_handles_404_gracefully() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let result = client
        .fetch_bytes(&format!("{}/missing.xml", mock_server.uri()))
        .await;

    match result {
        Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected HttpStatus 404, got {other:?}"),
    }
}

#[tokio::test]
async fn test_429_carries_retry_after() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/busy.xml"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let err = client
        .get(&format!("{}/busy.xml", mock_server.uri()))
        .await
        .expect_err("429 should be an error");

    match err {
        FetchError::HttpStatus {
            status,
            retry_after,
            ..
        } => {
            assert_eq!(status, 429);
            assert_eq!(retry_after.as_deref(), Some("7"));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_is_reusable() {
    let mock_server = require_mock_server!();
    for name in ["a", "b", "c"] {
        Mock::given(method("GET"))
            .and(path(format!("/{name}.xml")))
            .respond_with(ResponseTemplate::new(200).set_body_string(name))
            .mount(&mock_server)
            .await;
    }

    let client = HttpClient::new();
    for name in ["a", "b", "c"] {
        let body = client
            .fetch_bytes(&format!("{}/{name}.xml", mock_server.uri()))
            .await
            .expect("fetch should succeed");
        assert_eq!(body, name.as_bytes());
    }
}

#[tokio::test]
async fn test_with_retry_stops_on_permanent_status() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/gone.xml"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/gone.xml", mock_server.uri());
    let policy = RetryPolicy::new(5, Duration::ZERO, Duration::ZERO, 2.0);

    let (err, attempts) = with_retry(&policy, &RateLimiter::disabled(), &url, || {
        client.fetch_bytes(&url)
    })
    .await
    .expect_err("410 should fail");

    assert_eq!(attempts, 1);
    assert_eq!(err.status(), Some(410));
}

#[tokio::test]
async fn test_with_retry_gives_up_after_max_attempts() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/flaky.xml"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/flaky.xml", mock_server.uri());
    let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO, 2.0);

    let (_, attempts) = with_retry(&policy, &RateLimiter::disabled(), &url, || {
        client.fetch_bytes(&url)
    })
    .await
    .expect_err("502 every time should fail");

    assert_eq!(attempts, 3);
}

/// Serves one response whose body arrives a byte at a time, `gap` apart.
async fn serve_trickle(body: &'static [u8], gap: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        for byte in body {
            tokio::time::sleep(gap).await;
            if socket.write_all(&[*byte]).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }
    });
    format!("http://{addr}/ep.mp3")
}

#[tokio::test]
async fn test_slow_steady_body_outlives_read_timeout() {
    if should_skip_socket_bound_test() {
        return;
    }
    // 8 bytes at 400ms each takes longer than the 2s read timeout in total.
    let url = serve_trickle(b"episode!", Duration::from_millis(400)).await;

    let client = HttpClient::with_timeouts(1, 2);
    let body = client
        .fetch_bytes(&url)
        .await
        .expect("steady body should not time out");
    assert_eq!(body, b"episode!");
}

#[tokio::test]
async fn test_stalled_body_times_out() {
    if should_skip_socket_bound_test() {
        return;
    }
    let url = serve_trickle(b"x", Duration::from_secs(3)).await;

    let client = HttpClient::with_timeouts(1, 1);
    let err = client
        .fetch_bytes(&url)
        .await
        .expect_err("stalled body should time out");
    assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
}
