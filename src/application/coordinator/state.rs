//! State shared between the coordinator handle and its dispatcher.
//!
//! Two locks with distinct jobs. `gate` (async) serializes `start`, `stop`,
//! `update_config` and the dispatcher's handling of each signal, including
//! callback delivery. `core` (sync) guards the mutable state and is never
//! held across an await or while a callback runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use super::lifecycle::{Lifecycle, TransportTask};
use crate::application::dedup::Deduplicator;
use crate::application::metrics::MetricsCollector;
use crate::application::status::ConnectionStatusAggregator;
use crate::domain::{ConnectionStatus, EventKind, TransportMode};
use crate::error::{AuthError, ConfigError, Error};
use crate::infrastructure::config::SdkConfig;
use crate::port::inbound::{Callbacks, Notification};
use crate::port::outbound::{
    Clock, Credentials, Shutdown, Signal, SignalKind, TransportContext, TransportFactory, TransportSink,
};

pub(crate) struct Core {
    pub lifecycle: Lifecycle,
    /// Bumped on every start, stop and degrade; a dispatcher only acts for its own run.
    pub run: u64,
    next_epoch: u64,
    pub tasks: BTreeMap<TransportMode, TransportTask>,
    pub status: ConnectionStatusAggregator,
    pub mailbox: Option<mpsc::UnboundedSender<Signal>>,
    pub dispatcher: Option<watch::Sender<bool>>,
}

impl Core {
    pub fn new(primary: TransportMode) -> Self {
        Self {
            lifecycle: Lifecycle::Stopped,
            run: 0,
            next_epoch: 0,
            tasks: BTreeMap::new(),
            status: ConnectionStatusAggregator::new(primary),
            mailbox: None,
            dispatcher: None,
        }
    }

    fn is_active(&self, mode: TransportMode, epoch: u64) -> bool {
        self.tasks.get(&mode).is_some_and(|task| task.epoch == epoch)
    }

    /// Take every running task and forget its status.
    pub fn take_all(&mut self) -> (Vec<TransportTask>, Option<ConnectionStatus>) {
        let tasks = std::mem::take(&mut self.tasks).into_values().collect();
        (tasks, self.status.reset())
    }
}

pub(crate) struct Shared {
    pub gate: tokio::sync::Mutex<()>,
    pub core: Mutex<Core>,
    pub callbacks: RwLock<Callbacks>,
    pub config: watch::Sender<Arc<SdkConfig>>,
    pub credentials: Arc<Credentials>,
    pub clock: Arc<dyn Clock>,
    pub factory: Arc<dyn TransportFactory>,
    pub dedup: Deduplicator,
    pub metrics: MetricsCollector,
}

impl Shared {
    pub fn settings(&self) -> Arc<SdkConfig> {
        self.config.borrow().clone()
    }

    pub fn is_current(&self, run: u64) -> bool {
        self.core.lock().run == run
    }

    /// Deliver notifications in order. Must not be called with `core` held.
    pub fn deliver(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        let callbacks = self.callbacks.read().clone();
        for notification in &notifications {
            callbacks.deliver(notification);
        }
    }

    /// Spawn a fresh transport for `mode` and register it under a new epoch.
    ///
    /// The caller must have removed (and will drain) any previous task for
    /// the mode. Returns the aggregate edge caused by re-tracking the mode.
    pub fn spawn_transport(&self, core: &mut Core, mode: TransportMode) -> Result<Option<ConnectionStatus>, ConfigError> {
        if !self.factory.supports(mode) {
            return Err(ConfigError::UnsupportedMode { mode });
        }
        let Some(mailbox) = core.mailbox.clone() else {
            return Ok(None);
        };

        let context = TransportContext {
            config: self.config.subscribe(),
            credentials: self.credentials.clone(),
            clock: self.clock.clone(),
        };
        let mut transport = self.factory.create(mode, context)?;

        core.next_epoch += 1;
        let epoch = core.next_epoch;
        let (shutdown, flag) = Shutdown::channel();
        let sink = TransportSink::new(mailbox, mode, epoch);
        let handle = tokio::spawn(async move {
            transport.run(sink, flag).await;
        });

        info!(%mode, epoch, "Transport spawned");
        self.metrics.track(mode);
        core.tasks.insert(
            mode,
            TransportTask {
                mode,
                epoch,
                shutdown,
                handle,
            },
        );
        Ok(core.status.track(mode))
    }

    /// Apply one transport signal. Returns the auth error if the run must degrade.
    pub fn process(&self, signal: Signal, out: &mut Vec<Notification>) -> Option<AuthError> {
        let Signal { mode, epoch, kind } = signal;
        let mut core = self.core.lock();
        if !core.is_active(mode, epoch) {
            trace!(%mode, epoch, "Dropping signal from retired transport");
            return None;
        }

        match kind {
            SignalKind::Event(event) => {
                self.metrics.record_received(mode);
                if self.dedup.accept(&event) {
                    debug!(%mode, id = %event.id, kind = %event.kind, "Dispatching order event");
                    out.push(match event.kind {
                        EventKind::New => Notification::NewOrder(event),
                        EventKind::Update => Notification::OrderUpdate(event),
                    });
                } else {
                    self.metrics.record_duplicate(mode);
                    debug!(%mode, id = %event.id, "Duplicate order event dropped");
                }
            }
            SignalKind::Link(update) => {
                let change = core.status.update(mode, update, self.clock.wall_clock());
                if change.entered_reconnecting {
                    self.metrics.record_reconnect(mode);
                }
                if change.entered_failed {
                    warn!(%mode, "Transport failed; start() or update_config() restarts it");
                }
                if let Some(status) = change.edge {
                    info!(connected = status.connected, "Connection status changed");
                    out.push(Notification::ConnectionChange(status));
                }
            }
            SignalKind::Error(err) => {
                debug!(%mode, error = %err, "Transport error");
                out.push(Notification::Error(err.into()));
            }
            SignalKind::Parse(err) => {
                self.metrics.record_parse_error(mode);
                out.push(Notification::Error(err.into()));
            }
            SignalKind::Latency(latency) => self.metrics.record_latency(mode, latency),
            SignalKind::AuthLost(err) => {
                if core.lifecycle.is_running() {
                    return Some(err);
                }
            }
        }
        None
    }

    /// Drop to `Degraded`: stop every transport and ask for reauthentication.
    pub async fn degrade(&self, run: u64, err: AuthError) {
        let (tasks, edge) = {
            let mut core = self.core.lock();
            if core.run != run || !core.lifecycle.is_running() {
                return;
            }
            warn!(error = %err, "Authorization lost, stopping transports");
            core.lifecycle = Lifecycle::Degraded;
            core.run += 1;
            core.mailbox = None;
            core.dispatcher = None;
            core.take_all()
        };

        join_all(tasks.into_iter().map(TransportTask::drain)).await;

        let mut notifications: Vec<Notification> = edge.into_iter().map(Notification::ConnectionChange).collect();
        notifications.push(Notification::Error(Error::Auth(err)));
        self.deliver(notifications);
    }
}
