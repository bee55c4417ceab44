//! Callback recorder for asserting what the application was told.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{ConnectionStatus, MetricsSnapshot, OrderEvent};
use crate::port::inbound::Callbacks;

#[derive(Default)]
struct Recorded {
    new_orders: Vec<OrderEvent>,
    updates: Vec<OrderEvent>,
    connection_changes: Vec<ConnectionStatus>,
    errors: Vec<String>,
    reauth_requests: usize,
    metrics: Vec<MetricsSnapshot>,
}

/// Records every callback invocation.
#[derive(Clone, Default)]
pub struct RecordingCallbacks {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// A full callback set writing into this recorder.
    pub fn callbacks(&self) -> Callbacks {
        let new_orders = self.recorded.clone();
        let updates = self.recorded.clone();
        let changes = self.recorded.clone();
        let errors = self.recorded.clone();
        let metrics = self.recorded.clone();
        Callbacks::new()
            .on_new_order(move |event| new_orders.lock().new_orders.push(event.clone()))
            .on_order_update(move |event| updates.lock().updates.push(event.clone()))
            .on_connection_change(move |status| changes.lock().connection_changes.push(status.clone()))
            .on_error(move |err| {
                let mut recorded = errors.lock();
                if err.requires_reauthentication() {
                    recorded.reauth_requests += 1;
                }
                recorded.errors.push(err.to_string());
            })
            .on_metrics(move |snapshot| metrics.lock().metrics.push(snapshot.clone()))
    }

    pub fn new_order_ids(&self) -> Vec<String> {
        self.recorded.lock().new_orders.iter().map(|e| e.id.to_string()).collect()
    }

    pub fn update_ids(&self) -> Vec<String> {
        self.recorded.lock().updates.iter().map(|e| e.id.to_string()).collect()
    }

    pub fn new_orders(&self) -> Vec<OrderEvent> {
        self.recorded.lock().new_orders.clone()
    }

    /// The `connected` flag of every connection-change callback, in order.
    pub fn connection_changes(&self) -> Vec<bool> {
        self.recorded
            .lock()
            .connection_changes
            .iter()
            .map(|s| s.connected)
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.recorded.lock().errors.clone()
    }

    pub fn reauth_requests(&self) -> usize {
        self.recorded.lock().reauth_requests
    }

    pub fn metrics(&self) -> Vec<MetricsSnapshot> {
        self.recorded.lock().metrics.clone()
    }

    pub fn clear(&self) {
        *self.recorded.lock() = Recorded::default();
    }
}
