use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::TransportMode;

/// Counters for one transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMetrics {
    pub received: u64,
    pub duplicates_dropped: u64,
    pub parse_errors: u64,
    pub reconnects: u64,
    pub last_latency_ms: Option<u64>,
}

/// Point-in-time copy of all transport counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Epoch milliseconds, strictly increasing across snapshots.
    pub timestamp_ms: u64,
    pub transports: BTreeMap<TransportMode, TransportMetrics>,
}

impl MetricsSnapshot {
    #[must_use]
    pub fn transport(&self, mode: TransportMode) -> TransportMetrics {
        self.transports.get(&mode).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn total_received(&self) -> u64 {
        self.transports.values().map(|m| m.received).sum()
    }

    #[must_use]
    pub fn total_duplicates_dropped(&self) -> u64 {
        self.transports.values().map(|m| m.duplicates_dropped).sum()
    }

    #[must_use]
    pub fn total_parse_errors(&self) -> u64 {
        self.transports.values().map(|m| m.parse_errors).sum()
    }
}
