//! `HttpPollSource` against a minimal local HTTP server.

use std::time::Duration;

use order_relay::adapter::outbound::HttpPollSource;
use order_relay::domain::TransportMode;
use order_relay::error::{AuthError, Error, ParseError, TransportError};
use order_relay::infrastructure::config::AuthToken;
use order_relay::port::outbound::PollSource;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve one response and hand back the raw request head.
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/v1/delivery/deliveries/available_orders/", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let _ = tx.send(String::from_utf8_lossy(&head).into_owned());

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });

    (url, rx)
}

fn token() -> AuthToken {
    AuthToken::new("poll-token")
}

#[tokio::test]
async fn fetch_sends_bearer_and_splits_results() {
    let (url, head) = serve_once("200 OK", r#"{"count": 2, "results": [{"id": "A"}, {"id": 7}]}"#).await;

    let items = HttpPollSource::new()
        .fetch(&url, &token(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], "A");

    let head = head.await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("get /api/v1/delivery/deliveries/available_orders/ http/1.1"));
    assert!(head.contains("authorization: bearer poll-token"));
    assert!(head.contains("accept: application/json"));
}

#[tokio::test]
async fn unauthorized_is_an_auth_error() {
    let (url, _head) = serve_once("401 Unauthorized", r#"{"detail": "token expired"}"#).await;
    let err = HttpPollSource::new()
        .fetch(&url, &token(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Auth(AuthError::Rejected {
            mode: TransportMode::Polling,
            status: 401
        })
    ));
}

#[tokio::test]
async fn server_error_is_transient() {
    let (url, _head) = serve_once("503 Service Unavailable", "").await;
    let err = HttpPollSource::new()
        .fetch(&url, &token(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Status { status: 503 })));
}

#[tokio::test]
async fn unreadable_body_is_a_parse_error() {
    let (url, _head) = serve_once("200 OK", "<html>maintenance</html>").await;
    let err = HttpPollSource::new()
        .fetch(&url, &token(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::InvalidJson(_))));
}

#[tokio::test]
async fn slow_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/orders/", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let err = HttpPollSource::new()
        .fetch(&url, &token(), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Timeout { after_ms: 200 })));
    server.abort();
}
