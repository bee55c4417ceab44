//! The transport coordinator: the relay's public face.
//!
//! Owns the config, the deduplicator, the metrics collector and the status
//! aggregator. Transports run as independent tasks and report through a
//! mailbox; a per-run dispatcher applies their signals one at a time and
//! invokes the application's callbacks.
//!
//! ```no_run
//! use order_relay::application::Coordinator;
//! use order_relay::infrastructure::config::{AuthToken, SdkConfig};
//! use order_relay::port::inbound::Callbacks;
//!
//! # async fn demo() -> order_relay::error::Result<()> {
//! let config = SdkConfig {
//!     polling_endpoint: "https://api.example.com/api/v1/delivery/deliveries/available_orders/".into(),
//!     websocket_endpoint: "wss://api.example.com/ws/orders/".into(),
//!     auth_token: Some(AuthToken::new("jwt")),
//!     ..SdkConfig::default()
//! };
//! let coordinator = Coordinator::builder(config).build()?;
//! coordinator.set_callbacks(Callbacks::new().on_new_order(|order| println!("{}", order.id)));
//! coordinator.start().await?;
//! # coordinator.stop().await;
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod lifecycle;
mod reconfigure;
mod state;

use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use self::reconfigure::restart_plan;
use self::state::{Core, Shared};
use crate::adapter::outbound::TokioClock;
use crate::application::dedup::Deduplicator;
use crate::application::metrics::MetricsCollector;
use crate::application::transport::DefaultTransportFactory;
use crate::domain::{ConnectionStatus, MetricsSnapshot, OrderId};
use crate::error::{ConfigError, Error, Result};
use crate::infrastructure::config::{ConfigPatch, SdkConfig};
use crate::port::inbound::{Callbacks, Notification};
use crate::port::outbound::{AuthTokenProvider, Clock, Credentials, Shutdown, TransportFactory};

pub use lifecycle::{Lifecycle, DRAIN_GRACE_PERIOD};

/// Builder for [`Coordinator`]. Every collaborator has a production default.
pub struct CoordinatorBuilder {
    config: SdkConfig,
    token_provider: Option<Arc<dyn AuthTokenProvider>>,
    clock: Option<Arc<dyn Clock>>,
    factory: Option<Arc<dyn TransportFactory>>,
    callbacks: Callbacks,
}

impl CoordinatorBuilder {
    /// Token source. Without one, `config.auth_token` is used.
    #[must_use]
    pub fn token_provider(mut self, provider: Arc<dyn AuthTokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Time source for timers, dedup expiry and metrics. Defaults to tokio time.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the transports. Defaults to HTTP polling plus tokio-tungstenite.
    #[must_use]
    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Handlers installed before the first `start()`.
    #[must_use]
    pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Validate the config and assemble the coordinator. Nothing is spawned.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field of the config.
    pub fn build(self) -> std::result::Result<Coordinator, ConfigError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(DefaultTransportFactory::new()));
        let credentials = Arc::new(Credentials::new(self.token_provider, self.config.auth_token.clone()));
        let dedup = Deduplicator::new(self.config.dedup_window(), self.config.dedup_max_entries, clock.clone());
        let metrics = MetricsCollector::new(self.config.metrics_enabled);
        let core = Core::new(self.config.primary_mode);
        let (config, _) = watch::channel(Arc::new(self.config));

        Ok(Coordinator {
            shared: Arc::new(Shared {
                gate: tokio::sync::Mutex::new(()),
                core: Mutex::new(core),
                callbacks: RwLock::new(self.callbacks),
                config,
                credentials,
                clock,
                factory,
                dedup,
                metrics,
            }),
        })
    }
}

/// Runs the enabled transports and turns their output into callbacks.
///
/// Dropping the coordinator aborts any transport still running; call
/// [`stop`](Self::stop) for an orderly shutdown.
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    /// Start building a coordinator around `config`.
    #[must_use]
    pub fn builder(config: SdkConfig) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            token_provider: None,
            clock: None,
            factory: None,
            callbacks: Callbacks::default(),
        }
    }

    /// Start every enabled transport, primary first. No-op while running.
    ///
    /// A failed transport state from a previous run is reset. Modes the
    /// factory cannot build are reported through `on_error` and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`](crate::error::AuthError) when no valid token is
    /// available; `on_error` receives the same error and nothing is started.
    pub async fn start(&self) -> Result<()> {
        let _gate = self.shared.gate.lock().await;
        if self.shared.core.lock().lifecycle.is_running() {
            return Ok(());
        }

        if let Err(err) = self.shared.credentials.bearer().await {
            warn!(error = %err, "Cannot start without a valid token");
            self.shared.deliver(vec![Notification::Error(Error::Auth(err.clone()))]);
            return Err(err.into());
        }

        let config = self.shared.settings();
        let mut notifications = Vec::new();
        {
            let mut core = self.shared.core.lock();
            core.lifecycle = Lifecycle::Starting;
            core.run += 1;
            let run = core.run;
            info!(run, modes = ?config.start_order(), "Starting order relay");

            let (tx, rx) = mpsc::unbounded_channel();
            let (dispatcher, flag) = Shutdown::channel();
            core.mailbox = Some(tx);
            core.dispatcher = Some(dispatcher);
            tokio::spawn(dispatch::run(self.shared.clone(), run, rx, flag));

            core.status.set_primary(config.primary_mode);
            for mode in config.start_order() {
                match self.shared.spawn_transport(&mut core, mode) {
                    Ok(edge) => notifications.extend(edge.map(Notification::ConnectionChange)),
                    Err(err) => {
                        warn!(%mode, error = %err, "Transport not started");
                        notifications.push(Notification::Error(err.into()));
                    }
                }
            }
            core.lifecycle = Lifecycle::Running;
        }

        self.shared.deliver(notifications);
        Ok(())
    }

    /// Stop every transport and clear dedup state.
    ///
    /// When this returns, no callback fires until the next `start()`. If the
    /// relay was connected, a final `on_connection_change` is delivered first.
    pub async fn stop(&self) {
        let _gate = self.shared.gate.lock().await;
        let (tasks, edge) = {
            let mut core = self.shared.core.lock();
            if core.lifecycle == Lifecycle::Stopped {
                return;
            }
            core.lifecycle = Lifecycle::Stopping;
            core.run += 1;
            core.mailbox = None;
            if let Some(dispatcher) = core.dispatcher.take() {
                let _ = dispatcher.send(true);
            }
            core.take_all()
        };

        join_all(tasks.into_iter().map(|task| task.drain())).await;
        self.shared.dedup.clear();
        self.shared
            .deliver(edge.into_iter().map(Notification::ConnectionChange).collect());

        self.shared.core.lock().lifecycle = Lifecycle::Stopped;
        info!("Order relay stopped");
    }

    /// Merge `patch` into the active config.
    ///
    /// While running, only the transports whose connection parameters
    /// changed are restarted; interval, primary, reconnect and dedup changes
    /// apply from the next scheduling decision. Failed transports are
    /// restarted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an invalid result; the previous config
    /// stays active.
    pub async fn update_config(&self, patch: ConfigPatch) -> Result<()> {
        let _gate = self.shared.gate.lock().await;
        let current = self.shared.settings();
        let next = current.merged(&patch)?;
        let plan = restart_plan(&current, &next);

        if next.auth_token != current.auth_token {
            self.shared.credentials.set_pushed(next.auth_token.clone());
        }
        self.shared.dedup.set_window(next.dedup_window());
        self.shared.dedup.set_max_entries(next.dedup_max_entries);
        self.shared.metrics.set_enabled(next.metrics_enabled);
        let next = Arc::new(next);
        self.shared.config.send_replace(next.clone());
        info!(
            restart = ?plan.restart,
            stop = ?plan.stop,
            "Configuration updated"
        );

        let mut drains = Vec::new();
        let mut respawn = Vec::new();
        let mut notifications = Vec::new();
        {
            let mut core = self.shared.core.lock();
            core.status.set_primary(next.primary_mode);
            if !core.lifecycle.is_running() {
                return Ok(());
            }

            for mode in &plan.stop {
                if let Some(task) = core.tasks.remove(mode) {
                    drains.push(task);
                }
                notifications.extend(core.status.untrack(*mode).map(Notification::ConnectionChange));
            }

            let failed = core.status.failed_modes();
            for mode in next.start_order() {
                let running = core.tasks.contains_key(&mode);
                if !self.shared.factory.supports(mode) {
                    if !current.is_enabled(mode) {
                        notifications.push(Notification::Error(ConfigError::UnsupportedMode { mode }.into()));
                    }
                    continue;
                }
                if running && !plan.restart.contains(&mode) && !failed.contains(&mode) {
                    continue;
                }
                if let Some(task) = core.tasks.remove(&mode) {
                    drains.push(task);
                }
                respawn.push(mode);
            }
        }

        // A replacement only starts once its predecessor has fully exited.
        join_all(drains.into_iter().map(|task| task.drain())).await;

        if !respawn.is_empty() {
            let mut core = self.shared.core.lock();
            if !core.lifecycle.is_running() {
                respawn.clear();
            }
            for mode in respawn {
                match self.shared.spawn_transport(&mut core, mode) {
                    Ok(edge) => notifications.extend(edge.map(Notification::ConnectionChange)),
                    Err(err) => notifications.push(Notification::Error(err.into())),
                }
            }
        }

        self.shared.deliver(notifications);
        Ok(())
    }

    /// Forget `id` so its next broadcast is delivered again.
    ///
    /// Returns whether the id was being suppressed.
    pub fn mark_order_as_handled(&self, id: &str) -> bool {
        match OrderId::new(id) {
            Ok(id) => self.shared.dedup.remove(&id),
            Err(_) => false,
        }
    }

    /// Install handlers; ones absent from `callbacks` are kept.
    pub fn set_callbacks(&self, callbacks: Callbacks) {
        self.shared.callbacks.write().merge(callbacks);
    }

    /// Remove every handler; events keep flowing but reach nobody.
    pub fn clear_callbacks(&self) {
        *self.shared.callbacks.write() = Callbacks::default();
    }

    /// Aggregate and per-transport connectivity right now.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.shared.core.lock().status.snapshot()
    }

    /// Per-transport counters and latencies.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Current run state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.core.lock().lifecycle
    }

    /// Copy of the active config.
    #[must_use]
    pub fn config(&self) -> SdkConfig {
        self.shared.settings().as_ref().clone()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        let mut core = self.shared.core.lock();
        core.run += 1;
        core.mailbox = None;
        if let Some(dispatcher) = core.dispatcher.take() {
            let _ = dispatcher.send(true);
        }
        for task in core.tasks.values() {
            task.abort();
        }
        core.tasks.clear();
    }
}
