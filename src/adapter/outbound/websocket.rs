//! WebSocket push adapter on tokio-tungstenite.
//!
//! The bearer token travels both as `Authorization` header and in the URL
//! (already part of the [`ConnectRequest`]), since some proxies strip
//! upgrade headers. Ping frames are answered here so transports only ever
//! see text.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::domain::TransportMode;
use crate::error::{AuthError, Error, TransportError};
use crate::port::outbound::{ConnectRequest, PushStream, StreamMessage};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// tokio-tungstenite-backed [`PushStream`].
#[derive(Default)]
pub struct TungsteniteStream {
    ws: Option<Socket>,
}

impl TungsteniteStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.ws.is_some()
    }

    fn lost(&mut self, reason: impl Into<String>) -> Option<StreamMessage> {
        self.ws = None;
        Some(StreamMessage::Closed {
            reason: reason.into(),
        })
    }
}

#[async_trait]
impl PushStream for TungsteniteStream {
    async fn connect(&mut self, request: &ConnectRequest) -> Result<(), Error> {
        self.close().await;

        let mut handshake = request.url.as_str().into_client_request()?;
        let bearer =
            HeaderValue::from_str(&format!("Bearer {}", request.token.expose())).map_err(|_| AuthError::Malformed)?;
        handshake.headers_mut().insert(AUTHORIZATION, bearer);

        debug!(host = request.url.host_str().unwrap_or_default(), "Opening WebSocket");
        let (ws, response) = match tokio::time::timeout(request.timeout, connect_async(handshake)).await {
            Err(_) => {
                return Err(TransportError::Timeout {
                    after_ms: u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX),
                }
                .into())
            }
            Ok(Err(tungstenite::Error::Http(response)))
                if matches!(response.status().as_u16(), 401 | 403) =>
            {
                return Err(AuthError::Rejected {
                    mode: TransportMode::Websocket,
                    status: response.status().as_u16(),
                }
                .into())
            }
            Ok(Err(err)) => return Err(err.into()),
            Ok(Ok(pair)) => pair,
        };

        info!(status = %response.status(), "WebSocket connected");
        self.ws = Some(ws);
        Ok(())
    }

    async fn next_message(&mut self) -> Option<StreamMessage> {
        loop {
            let next = self.ws.as_mut()?.next().await;
            match next {
                Some(Ok(Message::Text(text))) => {
                    trace!(bytes = text.len(), "Received WebSocket text frame");
                    return Some(StreamMessage::Text(text));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => return Some(StreamMessage::Text(text)),
                    Err(_) => warn!("Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Ping(data))) => {
                    trace!("Received WebSocket ping");
                    let sent = match self.ws.as_mut() {
                        Some(ws) => ws.send(Message::Pong(data)).await,
                        None => return None,
                    };
                    if sent.is_err() {
                        return self.lost("failed to send pong");
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "WebSocket closed by server");
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    return self.lost(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    return self.lost(e.to_string());
                }
                None => return self.lost("stream ended"),
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            if let Err(e) = ws.close(None).await {
                debug!(error = %e, "WebSocket close handshake failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_closed() {
        let mut stream = TungsteniteStream::new();
        assert!(!stream.is_open());
        assert!(stream.next_message().await.is_none());
        stream.close().await;
    }
}
