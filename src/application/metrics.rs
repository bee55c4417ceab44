//! Per-transport counters.
//!
//! Increments never fail and never block for longer than a short lock.
//! Counters saturate instead of wrapping.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::domain::{MetricsSnapshot, TransportMetrics, TransportMode};

#[derive(Debug, Default)]
struct Counters {
    enabled: bool,
    transports: BTreeMap<TransportMode, TransportMetrics>,
    last_timestamp_ms: u64,
}

/// Accumulates [`TransportMetrics`] and hands out deep-copied snapshots.
#[derive(Debug)]
pub struct MetricsCollector {
    inner: Mutex<Counters>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: Mutex::new(Counters {
                enabled,
                ..Counters::default()
            }),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    /// Switch collection on or off; nothing is counted while off.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.lock().enabled = enabled;
    }

    /// Make `mode` appear in snapshots even before anything is counted.
    pub fn track(&self, mode: TransportMode) {
        self.inner.lock().transports.entry(mode).or_default();
    }

    /// An event arrived, before duplicate suppression.
    pub fn record_received(&self, mode: TransportMode) {
        self.update(mode, |m| m.received = m.received.saturating_add(1));
    }

    /// An event was suppressed as a duplicate.
    pub fn record_duplicate(&self, mode: TransportMode) {
        self.update(mode, |m| m.duplicates_dropped = m.duplicates_dropped.saturating_add(1));
    }

    /// A payload could not be decoded.
    pub fn record_parse_error(&self, mode: TransportMode) {
        self.update(mode, |m| m.parse_errors = m.parse_errors.saturating_add(1));
    }

    /// A reconnect attempt was scheduled.
    pub fn record_reconnect(&self, mode: TransportMode) {
        self.update(mode, |m| m.reconnects = m.reconnects.saturating_add(1));
    }

    /// Duration of one poll or one socket handshake.
    pub fn record_latency(&self, mode: TransportMode, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.update(mode, |m| m.last_latency_ms = Some(ms));
    }

    fn update(&self, mode: TransportMode, f: impl FnOnce(&mut TransportMetrics)) {
        let mut inner = self.inner.lock();
        if inner.enabled {
            f(inner.transports.entry(mode).or_default());
        }
    }

    /// Copy of all counters, stamped with a strictly increasing epoch-ms timestamp.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut inner = self.inner.lock();
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let timestamp_ms = now.max(inner.last_timestamp_ms.saturating_add(1));
        inner.last_timestamp_ms = timestamp_ms;
        MetricsSnapshot {
            timestamp_ms,
            transports: inner.transports.clone(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(true)
    }
}
