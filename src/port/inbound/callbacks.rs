//! Application callback registration.
//!
//! One typed registration point. Handlers are invoked in the order the
//! coordinator processes signals, one at a time, and a panicking handler is
//! contained so it cannot take the dispatcher down with it.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::domain::{ConnectionStatus, MetricsSnapshot, OrderEvent};
use crate::error::Error;

/// A shareable handler for values of type `T`.
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Something the relay tells the application.
#[derive(Debug)]
pub enum Notification {
    NewOrder(OrderEvent),
    OrderUpdate(OrderEvent),
    ConnectionChange(ConnectionStatus),
    Error(Error),
    Metrics(MetricsSnapshot),
}

impl Notification {
    const fn name(&self) -> &'static str {
        match self {
            Self::NewOrder(_) => "on_new_order",
            Self::OrderUpdate(_) => "on_order_update",
            Self::ConnectionChange(_) => "on_connection_change",
            Self::Error(_) => "on_error",
            Self::Metrics(_) => "on_metrics",
        }
    }
}

/// The set of handlers the application registered.
///
/// Built with the `on_*` methods:
///
/// ```
/// use order_relay::port::inbound::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .on_new_order(|event| println!("new order {}", event.id))
///     .on_connection_change(|status| println!("connected: {}", status.connected));
/// assert!(callbacks.has_new_order());
/// ```
#[derive(Clone, Default)]
pub struct Callbacks {
    new_order: Option<Handler<OrderEvent>>,
    order_update: Option<Handler<OrderEvent>>,
    connection_change: Option<Handler<ConnectionStatus>>,
    error: Option<Handler<Error>>,
    metrics: Option<Handler<MetricsSnapshot>>,
}

impl Callbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_new_order(mut self, f: impl Fn(&OrderEvent) + Send + Sync + 'static) -> Self {
        self.new_order = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_order_update(mut self, f: impl Fn(&OrderEvent) + Send + Sync + 'static) -> Self {
        self.order_update = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_connection_change(mut self, f: impl Fn(&ConnectionStatus) + Send + Sync + 'static) -> Self {
        self.connection_change = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_metrics(mut self, f: impl Fn(&MetricsSnapshot) + Send + Sync + 'static) -> Self {
        self.metrics = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn has_new_order(&self) -> bool {
        self.new_order.is_some()
    }

    /// Overlay `other` onto `self`: handlers present in `other` win, absent
    /// ones leave the current handler in place.
    pub fn merge(&mut self, other: Callbacks) {
        if other.new_order.is_some() {
            self.new_order = other.new_order;
        }
        if other.order_update.is_some() {
            self.order_update = other.order_update;
        }
        if other.connection_change.is_some() {
            self.connection_change = other.connection_change;
        }
        if other.error.is_some() {
            self.error = other.error;
        }
        if other.metrics.is_some() {
            self.metrics = other.metrics;
        }
    }

    /// Invoke the matching handler, if registered.
    ///
    /// Returns `false` when the handler panicked.
    pub fn deliver(&self, notification: &Notification) -> bool {
        let outcome = match notification {
            Notification::NewOrder(event) => invoke(self.new_order.as_ref(), event),
            Notification::OrderUpdate(event) => invoke(self.order_update.as_ref(), event),
            Notification::ConnectionChange(status) => invoke(self.connection_change.as_ref(), status),
            Notification::Error(err) => invoke(self.error.as_ref(), err),
            Notification::Metrics(snapshot) => invoke(self.metrics.as_ref(), snapshot),
        };
        if outcome.is_err() {
            error!(callback = notification.name(), "Application callback panicked");
            return false;
        }
        true
    }
}

fn invoke<T>(handler: Option<&Handler<T>>, value: &T) -> std::thread::Result<()> {
    match handler {
        Some(handler) => catch_unwind(AssertUnwindSafe(|| handler(value))),
        None => Ok(()),
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("new_order", &self.new_order.is_some())
            .field("order_update", &self.order_update.is_some())
            .field("connection_change", &self.connection_change.is_some())
            .field("error", &self.error.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
