//! Persistent socket transport with bounded reconnection.
//!
//! Lifecycle per connection: authenticate at connect time, pump frames
//! until the socket drops, then back off and reconnect. A connection that
//! stays up for one full backoff cycle resets the attempt counter. After
//! `max_attempts` consecutive failures the transport reports `failed` and
//! returns; only the coordinator can bring it back.

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::application::backoff::Backoff;
use crate::domain::envelope::{self, Frame};
use crate::domain::{LinkUpdate, TransportMode};
use crate::error::{Error, TransportError};
use crate::infrastructure::config::{AuthToken, SdkConfig};
use crate::port::outbound::{
    Clock, ConnectRequest, PushStream, Shutdown, StreamMessage, Transport, TransportContext, TransportSink,
};

enum PumpEnd {
    Shutdown,
    Lost(String),
}

/// Socket URL: endpoint, then identity parameters, then `token`.
pub fn connect_url(config: &SdkConfig, token: &AuthToken) -> Result<Url, TransportError> {
    let mut url = Url::parse(&config.websocket_endpoint)
        .map_err(|e| TransportError::Connection(format!("invalid websocket endpoint: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in &config.identity {
            query.append_pair(key, value);
        }
        query.append_pair("token", token.expose());
    }
    Ok(url)
}

pub struct WebSocketTransport {
    stream: Box<dyn PushStream>,
    context: TransportContext,
    backoff: Backoff,
}

impl WebSocketTransport {
    #[must_use]
    pub fn new(stream: Box<dyn PushStream>, context: TransportContext) -> Self {
        Self {
            stream,
            context,
            backoff: Backoff::new(),
        }
    }

    async fn pump(&mut self, sink: &TransportSink, shutdown: &mut Shutdown) -> PumpEnd {
        let clock = self.context.clock.clone();
        let policy = self.context.settings().reconnect.clone();
        let mut stable = self.backoff.attempt() == 0;
        let stability = clock.sleep(self.backoff.cycle_delay(&policy));
        tokio::pin!(stability);

        loop {
            tokio::select! {
                _ = shutdown.triggered() => return PumpEnd::Shutdown,
                _ = &mut stability, if !stable => {
                    stable = true;
                    debug!(attempts = self.backoff.attempt(), "Connection stable, resetting backoff");
                    self.backoff.reset();
                    sink.report_link(LinkUpdate::connected(0));
                }
                message = self.stream.next_message() => match message {
                    Some(StreamMessage::Text(text)) => handle_frame(sink, clock.as_ref(), &text),
                    Some(StreamMessage::Closed { reason }) => return PumpEnd::Lost(reason),
                    None => return PumpEnd::Lost("connection dropped".to_string()),
                },
            }
        }
    }

    /// Connect once. `Ok(None)` means shutdown was requested meanwhile.
    async fn connect(&mut self, sink: &TransportSink, shutdown: &mut Shutdown) -> Result<Option<()>, Error> {
        let config = self.context.settings();
        let token = self.context.credentials.bearer().await?;
        let request = ConnectRequest {
            url: connect_url(&config, &token)?,
            token,
            timeout: config.request_timeout(),
        };

        let started = self.context.clock.now();
        tokio::select! {
            _ = shutdown.triggered() => Ok(None),
            result = self.stream.connect(&request) => {
                result?;
                sink.record_latency(self.context.clock.now().saturating_duration_since(started));
                Ok(Some(()))
            }
        }
    }
}

fn handle_frame(sink: &TransportSink, clock: &dyn Clock, text: &str) {
    match envelope::decode_frame(text, clock.wall_clock()) {
        Ok(Frame::Order(event)) => {
            trace!(id = %event.id, kind = %event.kind, "Order frame");
            sink.emit_event(event);
        }
        Ok(Frame::ServerError(message)) => {
            warn!(error = %message, "Server sent error frame");
            sink.report_error(TransportError::Server(message));
        }
        Ok(Frame::Control) => trace!("Control frame"),
        Err(e) => {
            warn!(error = %e, bytes = text.len(), "Dropping malformed frame");
            sink.report_parse_error(e);
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Websocket
    }

    async fn run(&mut self, sink: TransportSink, mut shutdown: Shutdown) {
        info!(epoch = sink.epoch(), "WebSocket transport started");
        sink.report_link(LinkUpdate::connecting());
        let clock = self.context.clock.clone();

        loop {
            if shutdown.is_triggered() {
                break;
            }

            let failure = match self.connect(&sink, &mut shutdown).await {
                Ok(None) => break,
                Ok(Some(())) => {
                    info!(attempt = self.backoff.attempt(), "WebSocket transport connected");
                    sink.report_link(LinkUpdate::connected(self.backoff.attempt()));
                    match self.pump(&sink, &mut shutdown).await {
                        PumpEnd::Shutdown => break,
                        PumpEnd::Lost(reason) => TransportError::Closed { reason },
                    }
                }
                Err(Error::Auth(e)) => {
                    warn!(error = %e, "WebSocket lost authorization");
                    sink.auth_lost(e);
                    break;
                }
                Err(Error::Transport(e)) => e,
                Err(other) => TransportError::Connection(other.to_string()),
            };

            let message = failure.to_string();
            sink.report_error(failure);
            let policy = self.context.settings().reconnect.clone();
            match self.backoff.on_failure(&policy) {
                Some(delay) => {
                    info!(
                        error = %message,
                        attempt = self.backoff.attempt(),
                        delay_ms = delay.as_millis(),
                        "Reconnecting after delay"
                    );
                    sink.report_link(LinkUpdate::reconnecting(self.backoff.attempt(), message));
                    tokio::select! {
                        _ = shutdown.triggered() => break,
                        _ = clock.sleep(delay) => {}
                    }
                }
                None => {
                    let attempts = self.backoff.attempt();
                    warn!(error = %message, attempts, "WebSocket gave up reconnecting");
                    sink.report_link(LinkUpdate::failed(attempts, message));
                    sink.report_error(TransportError::Exhausted { attempts });
                    break;
                }
            }
        }

        self.stream.close().await;
        debug!(epoch = sink.epoch(), "WebSocket transport stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::LinkStatus;
    use crate::port::outbound::{Signal, SignalKind};
    use crate::testkit::config::test_context;
    use crate::testkit::stream::ScriptedPushStream;

    fn spawn(
        stream: ScriptedPushStream,
        context: TransportContext,
    ) -> (mpsc::UnboundedReceiver<Signal>, tokio::sync::watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop, shutdown) = Shutdown::channel();
        let mut transport = WebSocketTransport::new(Box::new(stream), context);
        let handle = tokio::spawn(async move {
            transport.run(TransportSink::new(tx, TransportMode::Websocket, 1), shutdown).await;
        });
        (rx, stop, handle)
    }

    fn links(rx: &mut mpsc::UnboundedReceiver<Signal>) -> Vec<LinkUpdate> {
        let mut out = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            if let SignalKind::Link(update) = signal.kind {
                out.push(update);
            }
        }
        out
    }

    #[test]
    fn url_carries_identity_and_token() {
        let mut config = SdkConfig {
            websocket_endpoint: "wss://example.com/ws/orders/".into(),
            ..SdkConfig::default()
        };
        config.identity = BTreeMap::from([("driver_id".to_string(), "42".to_string())]);
        let url = connect_url(&config, &AuthToken::new("abc")).unwrap();
        assert_eq!(url.as_str(), "wss://example.com/ws/orders/?driver_id=42&token=abc");
    }

    #[tokio::test(start_paused = true)]
    async fn frames_become_signals() {
        let (stream, handle) = ScriptedPushStream::new();
        let (ctx, _config) = test_context();
        let (mut rx, stop, task) = spawn(stream, ctx);

        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.send_text(r#"{"type":"new_order","data":{"id":"ORD-1"}}"#);
        handle.send_text(r#"{"type":"heartbeat"}"#);
        handle.send_text("not json");
        handle.send_text(r#"{"type":"error","message":"slow down"}"#);
        tokio::time::sleep(Duration::from_millis(1)).await;

        let mut kinds = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            kinds.push(signal.kind);
        }
        assert!(kinds.iter().any(|k| matches!(k, SignalKind::Event(e) if e.id.as_str() == "ORD-1")));
        assert_eq!(kinds.iter().filter(|k| matches!(k, SignalKind::Parse(_))).count(), 1);
        assert!(kinds
            .iter()
            .any(|k| matches!(k, SignalKind::Error(TransportError::Server(m)) if m == "slow down")));
        assert_eq!(handle.connects(), 1);

        stop.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(handle.open_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_delays_double_then_reset() {
        let (stream, handle) = ScriptedPushStream::new();
        for _ in 0..3 {
            handle.fail_next_connect(TransportError::Connection("refused".into()));
        }
        let (ctx, _config) = test_context();
        let (mut rx, stop, task) = spawn(stream, ctx);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(handle.connects(), 1);
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(handle.connects(), 2);
        tokio::time::sleep(Duration::from_millis(4000)).await;
        assert_eq!(handle.connects(), 3);
        tokio::time::sleep(Duration::from_millis(7990)).await;
        assert_eq!(handle.connects(), 3);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.connects(), 4);

        let updates = links(&mut rx);
        let attempts: Vec<_> = updates
            .iter()
            .filter(|u| u.status == LinkStatus::Reconnecting)
            .map(|u| u.reconnect_attempt)
            .collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        assert_eq!(updates.last(), Some(&LinkUpdate::connected(3)));

        // Staying up for one full cycle (2000 * 2^3) resets the counter.
        tokio::time::sleep(Duration::from_millis(16_000)).await;
        assert_eq!(links(&mut rx), vec![LinkUpdate::connected(0)]);

        stop.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_connection_reconnects() {
        let (stream, handle) = ScriptedPushStream::new();
        let (ctx, _config) = test_context();
        let (mut rx, stop, task) = spawn(stream, ctx);

        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.drop_connection("server restart");
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(handle.connects(), 2);
        assert_eq!(handle.open_connections(), 1);
        assert!(links(&mut rx)
            .iter()
            .any(|u| u.status == LinkStatus::Reconnecting && u.last_error.as_deref() == Some("connection closed: server restart")));

        stop.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let (stream, handle) = ScriptedPushStream::new();
        for _ in 0..3 {
            handle.fail_next_connect(TransportError::Connection("refused".into()));
        }
        let (ctx, config) = test_context();
        config.send_modify(|c| {
            let mut next = (**c).clone();
            next.reconnect.max_attempts = 3;
            *c = Arc::new(next);
        });
        let (mut rx, _stop, task) = spawn(stream, ctx);

        task.await.unwrap();
        assert_eq!(handle.connects(), 3);
        assert_eq!(links(&mut rx).last().map(|u| u.status), Some(LinkStatus::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_handshake_is_auth_loss() {
        let (stream, handle) = ScriptedPushStream::new();
        handle.reject_next_connect(403);
        let (ctx, _config) = test_context();
        let (mut rx, _stop, task) = spawn(stream, ctx);

        task.await.unwrap();
        let mut auth_lost = false;
        while let Ok(signal) = rx.try_recv() {
            auth_lost |= matches!(signal.kind, SignalKind::AuthLost(_));
        }
        assert!(auth_lost);
        assert_eq!(handle.connects(), 1);
    }
}
