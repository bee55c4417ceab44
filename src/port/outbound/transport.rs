//! The transport plug-in seam.
//!
//! A transport runs in its own task and talks to the coordinator only
//! through its [`TransportSink`]. It never touches coordinator state. Every
//! signal is stamped with the epoch the transport was started under, so the
//! coordinator can discard anything a cancelled transport sends late.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::trace;

use super::{Clock, Credentials};
use crate::domain::{LinkUpdate, OrderEvent, TransportMode};
use crate::error::{AuthError, ConfigError, ParseError, TransportError};
use crate::infrastructure::config::SdkConfig;

/// Payload of a transport report.
#[derive(Debug)]
pub enum SignalKind {
    Event(OrderEvent),
    Link(LinkUpdate),
    Error(TransportError),
    Parse(ParseError),
    Latency(Duration),
    /// Credentials were refused or unavailable; the run must end.
    AuthLost(AuthError),
}

/// A report from one transport instance.
#[derive(Debug)]
pub struct Signal {
    pub mode: TransportMode,
    pub epoch: u64,
    pub kind: SignalKind,
}

/// Upward channel handed to a running transport.
#[derive(Debug, Clone)]
pub struct TransportSink {
    tx: mpsc::UnboundedSender<Signal>,
    mode: TransportMode,
    epoch: u64,
}

impl TransportSink {
    pub fn new(tx: mpsc::UnboundedSender<Signal>, mode: TransportMode, epoch: u64) -> Self {
        Self { tx, mode, epoch }
    }

    #[must_use]
    pub const fn mode(&self) -> TransportMode {
        self.mode
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Forward a decoded order event.
    pub fn emit_event(&self, event: OrderEvent) {
        self.send(SignalKind::Event(event));
    }

    /// Report a change in link state.
    pub fn report_link(&self, update: LinkUpdate) {
        self.send(SignalKind::Link(update));
    }

    /// Report a transient failure.
    pub fn report_error(&self, error: TransportError) {
        self.send(SignalKind::Error(error));
    }

    /// Report an undecodable payload.
    pub fn report_parse_error(&self, error: ParseError) {
        self.send(SignalKind::Parse(error));
    }

    /// Record a fetch or handshake latency sample.
    pub fn record_latency(&self, latency: Duration) {
        self.send(SignalKind::Latency(latency));
    }

    /// Report that the token was rejected; the run degrades.
    pub fn auth_lost(&self, error: AuthError) {
        self.send(SignalKind::AuthLost(error));
    }

    fn send(&self, kind: SignalKind) {
        let signal = Signal {
            mode: self.mode,
            epoch: self.epoch,
            kind,
        };
        if self.tx.send(signal).is_err() {
            trace!(mode = %self.mode, epoch = self.epoch, "Coordinator mailbox closed, signal dropped");
        }
    }
}

/// Cooperative cancellation flag observed by a running transport.
///
/// Dropping the sending side counts as a shutdown request.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Create a linked trigger/flag pair.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once shutdown has been requested.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Everything a transport needs from its environment.
#[derive(Clone)]
pub struct TransportContext {
    /// Live view of the coordinator's config; re-read at each scheduling decision.
    pub config: watch::Receiver<Arc<SdkConfig>>,
    pub credentials: Arc<Credentials>,
    pub clock: Arc<dyn Clock>,
}

impl TransportContext {
    /// Snapshot of the current config.
    #[must_use]
    pub fn settings(&self) -> Arc<SdkConfig> {
        self.config.borrow().clone()
    }
}

/// A long-running source of order events.
#[async_trait]
pub trait Transport: Send {
    fn mode(&self) -> TransportMode;

    /// Run until `shutdown` triggers or the transport gives up.
    ///
    /// Must return promptly once shutdown is requested.
    async fn run(&mut self, sink: TransportSink, shutdown: Shutdown);
}

/// Builds transports for the coordinator.
pub trait TransportFactory: Send + Sync {
    fn supports(&self, mode: TransportMode) -> bool;

    /// Build a fresh transport for `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedMode`] for modes this factory cannot build.
    fn create(&self, mode: TransportMode, context: TransportContext) -> Result<Box<dyn Transport>, ConfigError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_resolves_on_trigger() {
        let (tx, mut shutdown) = Shutdown::channel();
        assert!(!shutdown.is_triggered());
        tx.send(true).unwrap();
        shutdown.triggered().await;
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn dropped_trigger_counts_as_shutdown() {
        let (tx, mut shutdown) = Shutdown::channel();
        drop(tx);
        shutdown.triggered().await;
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn sink_stamps_mode_and_epoch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = TransportSink::new(tx, TransportMode::Polling, 7);
        sink.record_latency(Duration::from_millis(12));

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.mode, TransportMode::Polling);
        assert_eq!(signal.epoch, 7);
        assert!(matches!(signal.kind, SignalKind::Latency(d) if d == Duration::from_millis(12)));
    }
}
