//! Client Tests
//!
//! These tests verify, against bare TCP listeners:
//! - Exact bytes on the wire
//! - Invalid links never reach the network
//! - Connection failures, timeouts, cancellation
//! - Response size limit
//! - Completion callbacks

use std::time::{Duration, Instant};

use linkrelay::error::{ErrorKind, RelayError};
use linkrelay::network::{submit, Completion, RelayClient};
use linkrelay::protocol::Response;
use linkrelay::{Config, Endpoint};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Helper Functions
// =============================================================================

async fn bind_local() -> (TcpListener, Endpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, Endpoint::new("127.0.0.1", port).unwrap())
}

/// Accept one connection, read until the client half-closes, reply, close.
/// Resolves to the bytes the client sent.
fn serve_once(listener: TcpListener, reply: &'static [u8]) -> JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();
        stream.write_all(reply).await.unwrap();
        stream.shutdown().await.unwrap();
        received
    })
}

/// Accept connections and hold them open without replying
fn serve_silently(listener: TcpListener) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    })
}

/// Accept one connection, read the request, send `first`, then keep
/// trickling bytes without ever closing. Resolves to true once a write
/// fails, i.e. the client has dropped its socket.
fn serve_until_closed(listener: TcpListener, first: &'static [u8]) -> JoinHandle<bool> {
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        stream.read_to_end(&mut request).await.unwrap();
        if stream.write_all(first).await.is_err() {
            return true;
        }
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if stream.write_all(b".").await.is_err() {
                return true;
            }
        }
        false
    })
}

fn cancel_after(cancel: &CancellationToken, delay: Duration) {
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
}

async fn unused_endpoint() -> Endpoint {
    let (listener, endpoint) = bind_local().await;
    drop(listener);
    endpoint
}

// =============================================================================
// Wire Format Tests
// =============================================================================

#[tokio::test]
async fn test_submit_sends_exactly_two_lines() {
    let (listener, endpoint) = bind_local().await;
    let server = serve_once(listener, b"OK");

    let response = RelayClient::new(endpoint)
        .submit("http://example.com/file.iso")
        .await
        .unwrap();

    assert_eq!(response.as_bytes(), b"OK");
    assert_eq!(
        server.await.unwrap(),
        b"modprobe http\r\ndo http://example.com/file.iso\r\n"
    );
}

#[tokio::test]
async fn test_submit_empty_response() {
    let (listener, endpoint) = bind_local().await;
    let server = serve_once(listener, b"");

    let response = RelayClient::new(endpoint).submit("http://example.com/").await.unwrap();

    assert!(response.is_empty());
    server.await.unwrap();
}

#[tokio::test]
async fn test_invalid_link_sends_nothing() {
    let (listener, endpoint) = bind_local().await;
    let client = RelayClient::new(endpoint);

    let err = client
        .submit("http://example.com/a\r\nrmmod http")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCommand);

    let err = client.submit("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCommand);

    let accepted = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
    assert!(accepted.is_err(), "client must not connect for an invalid link");
}

#[tokio::test]
async fn test_free_submit_function() {
    let (listener, endpoint) = bind_local().await;
    let server = serve_once(listener, b"queued");

    let response = submit(&endpoint, "ftp://mirror.example/pub/a.tar").await.unwrap();

    assert_eq!(response.to_string_lossy(), "queued");
    server.await.unwrap();
}

// =============================================================================
// Failure Tests
// =============================================================================

#[tokio::test]
async fn test_connection_refused() {
    let endpoint = unused_endpoint().await;

    let err = RelayClient::new(endpoint.clone())
        .submit("http://example.com/")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    assert!(err.to_string().contains(&endpoint.to_string()));
}

#[tokio::test]
async fn test_timeout_when_server_never_replies() {
    let (listener, endpoint) = bind_local().await;
    let _server = serve_silently(listener);

    let client = RelayClient::new(endpoint).with_timeout(Duration::from_millis(100));
    let start = Instant::now();
    let err = client.submit("http://example.com/").await.unwrap_err();

    assert!(matches!(err, RelayError::Timeout(d) if d == Duration::from_millis(100)));
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_response_too_large() {
    let (listener, endpoint) = bind_local().await;
    let server = serve_once(listener, &[b'x'; 2048]);

    let err = RelayClient::new(endpoint)
        .with_max_response_bytes(1024)
        .submit("http://example.com/")
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::ResponseTooLarge { limit: 1024 }));
    assert_eq!(err.kind(), ErrorKind::Io);
    let _ = server.await;
}

#[tokio::test]
async fn test_response_too_large_closes_connection() {
    let (listener, endpoint) = bind_local().await;
    let server = serve_until_closed(listener, &[b'x'; 2048]);

    let err = RelayClient::new(endpoint)
        .with_max_response_bytes(1024)
        .with_timeout(Duration::from_secs(10))
        .submit("http://example.com/")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(server.await.unwrap(), "client kept the connection open after aborting");
}

#[tokio::test]
async fn test_from_config_uses_limits() {
    let (listener, endpoint) = bind_local().await;
    let server = serve_once(listener, b"0123456789");

    let config = Config::builder()
        .endpoint(endpoint)
        .max_response_bytes(4)
        .timeout_ms(2000)
        .build();
    let client = RelayClient::from_config(&config);
    assert_eq!(client.timeout(), Duration::from_millis(2000));

    let err = client.submit("http://example.com/").await.unwrap_err();
    assert!(matches!(err, RelayError::ResponseTooLarge { limit: 4 }));
    let _ = server.await;
}

// =============================================================================
// Cancellation Tests
// =============================================================================

#[tokio::test]
async fn test_cancel_in_flight() {
    let (listener, endpoint) = bind_local().await;
    let _server = serve_silently(listener);

    let client = RelayClient::new(endpoint).with_timeout(Duration::from_secs(10));
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(50));

    let start = Instant::now();
    let err = client
        .submit_cancellable("http://example.com/", &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_cancel_mid_response_discards_partial_and_closes() {
    let (listener, endpoint) = bind_local().await;
    let server = serve_until_closed(listener, b"partial");

    let client = RelayClient::new(endpoint).with_timeout(Duration::from_secs(10));
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(80));

    let result = client.submit_cancellable("http://example.com/", &cancel).await;

    match result {
        Err(err) => assert_eq!(err.kind(), ErrorKind::Cancelled),
        Ok(response) => panic!("partial response delivered: {:?}", response),
    }
    assert!(server.await.unwrap(), "client kept the connection open after cancel");
}

#[tokio::test]
async fn test_cancelled_before_start_never_connects() {
    let (listener, endpoint) = bind_local().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = RelayClient::new(endpoint)
        .submit_cancellable("http://example.com/", &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    let accepted = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
    assert!(accepted.is_err());
}

// =============================================================================
// Completion Tests
// =============================================================================

#[tokio::test]
async fn test_completion_finished() {
    let (listener, endpoint) = bind_local().await;
    let server = serve_once(listener, b"OK");
    let (tx, rx) = oneshot::channel();

    RelayClient::new(endpoint)
        .submit_with("http://example.com/", &CancellationToken::new(), tx)
        .await;

    let response = rx.await.unwrap().unwrap();
    assert_eq!(response.as_bytes(), b"OK");
    server.await.unwrap();
}

#[tokio::test]
async fn test_completion_failed() {
    let endpoint = unused_endpoint().await;
    let (tx, rx) = oneshot::channel();

    RelayClient::new(endpoint)
        .submit_with("http://example.com/", &CancellationToken::new(), tx)
        .await;

    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
}

/// Records which callback fired
struct Outcome<'a>(&'a mut Option<Result<usize, ErrorKind>>);

impl Completion for Outcome<'_> {
    fn finished(self, response: Response) {
        *self.0 = Some(Ok(response.len()));
    }

    fn failed(self, error: RelayError) {
        *self.0 = Some(Err(error.kind()));
    }
}

#[tokio::test]
async fn test_completion_cancelled_reports_failure_only() {
    let (listener, endpoint) = bind_local().await;
    let _server = serve_silently(listener);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut outcome = None;
    RelayClient::new(endpoint)
        .submit_with("http://example.com/", &cancel, Outcome(&mut outcome))
        .await;

    assert_eq!(outcome, Some(Err(ErrorKind::Cancelled)));
}

#[tokio::test]
async fn test_completion_cancel_mid_response_reports_failure_only() {
    let (listener, endpoint) = bind_local().await;
    let server = serve_until_closed(listener, b"partial");
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(80));

    let mut outcome = None;
    RelayClient::new(endpoint)
        .with_timeout(Duration::from_secs(10))
        .submit_with("http://example.com/", &cancel, Outcome(&mut outcome))
        .await;

    assert_eq!(outcome, Some(Err(ErrorKind::Cancelled)));
    assert!(server.await.unwrap());
}
