//! Connection status aggregation.
//!
//! `connected = OR(every tracked transport is connected)`. Only edges of
//! that aggregate are reported to the application; per-transport churn that
//! leaves it unchanged stays internal.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::{ConnectionStatus, LinkStatus, LinkUpdate, TransportConnectionState, TransportMode};

/// Result of recording one [`LinkUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusChange {
    /// New aggregate status when `connected` flipped.
    pub edge: Option<ConnectionStatus>,
    /// The transport scheduled a new reconnect attempt.
    pub entered_reconnecting: bool,
    /// The transport gave up.
    pub entered_failed: bool,
}

#[derive(Debug)]
pub struct ConnectionStatusAggregator {
    primary: TransportMode,
    transports: BTreeMap<TransportMode, TransportConnectionState>,
    connected: bool,
}

impl ConnectionStatusAggregator {
    #[must_use]
    pub fn new(primary: TransportMode) -> Self {
        Self {
            primary,
            transports: BTreeMap::new(),
            connected: false,
        }
    }

    /// Change the primary reported in snapshots.
    pub fn set_primary(&mut self, primary: TransportMode) {
        self.primary = primary;
    }

    /// Start tracking `mode` afresh in `connecting`; clears a `failed` state.
    pub fn track(&mut self, mode: TransportMode) -> Option<ConnectionStatus> {
        let previous = self
            .transports
            .get(&mode)
            .and_then(|state| state.last_connected_at);
        self.transports.insert(
            mode,
            TransportConnectionState {
                last_connected_at: previous,
                ..TransportConnectionState::default()
            },
        );
        self.recompute()
    }

    /// Stop tracking `mode`, e.g. when it is disabled.
    pub fn untrack(&mut self, mode: TransportMode) -> Option<ConnectionStatus> {
        self.transports.remove(&mode)?;
        self.recompute()
    }

    /// Forget every transport, e.g. on stop.
    pub fn reset(&mut self) -> Option<ConnectionStatus> {
        self.transports.clear();
        self.recompute()
    }

    /// Record a transport report. Reports for untracked modes are ignored.
    pub fn update(&mut self, mode: TransportMode, update: LinkUpdate, now: DateTime<Utc>) -> StatusChange {
        let Some(state) = self.transports.get_mut(&mode) else {
            return StatusChange::default();
        };

        let entered_reconnecting = update.status == LinkStatus::Reconnecting
            && (state.status != LinkStatus::Reconnecting || state.reconnect_attempt != update.reconnect_attempt);
        let entered_failed = update.status == LinkStatus::Failed && state.status != LinkStatus::Failed;

        if update.status == LinkStatus::Connected && state.status != LinkStatus::Connected {
            state.last_connected_at = Some(now);
        }
        state.status = update.status;
        state.reconnect_attempt = update.reconnect_attempt;
        if update.last_error.is_some() || update.status == LinkStatus::Connected {
            state.last_error = update.last_error;
        }

        StatusChange {
            edge: self.recompute(),
            entered_reconnecting,
            entered_failed,
        }
    }

    fn recompute(&mut self) -> Option<ConnectionStatus> {
        let connected = self.transports.values().any(TransportConnectionState::is_connected);
        if connected == self.connected {
            return None;
        }
        self.connected = connected;
        Some(self.snapshot())
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn is_tracked(&self, mode: TransportMode) -> bool {
        self.transports.contains_key(&mode)
    }

    #[must_use]
    pub fn failed_modes(&self) -> Vec<TransportMode> {
        self.transports
            .iter()
            .filter(|(_, state)| state.is_failed())
            .map(|(mode, _)| *mode)
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.connected,
            primary: self.primary,
            transports: self.transports.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> ConnectionStatusAggregator {
        let mut agg = ConnectionStatusAggregator::new(TransportMode::Websocket);
        assert!(agg.track(TransportMode::Polling).is_none());
        assert!(agg.track(TransportMode::Websocket).is_none());
        agg
    }

    #[test]
    fn repeated_connected_reports_emit_one_edge() {
        let mut agg = aggregator();
        let mut edges = 0;
        for _ in 0..100 {
            if agg
                .update(TransportMode::Polling, LinkUpdate::connected(0), Utc::now())
                .edge
                .is_some()
            {
                edges += 1;
            }
        }
        assert_eq!(edges, 1);
        assert!(agg.is_connected());
    }

    #[test]
    fn flicker_of_one_transport_is_not_an_edge() {
        let mut agg = aggregator();
        agg.update(TransportMode::Polling, LinkUpdate::connected(0), Utc::now());
        agg.update(TransportMode::Websocket, LinkUpdate::connected(0), Utc::now());

        let change = agg.update(
            TransportMode::Websocket,
            LinkUpdate::reconnecting(1, "reset by peer"),
            Utc::now(),
        );
        assert!(change.edge.is_none());
        assert!(change.entered_reconnecting);

        let change = agg.update(TransportMode::Polling, LinkUpdate::reconnecting(1, "timeout"), Utc::now());
        let edge = change.edge.unwrap();
        assert!(!edge.connected);
        assert_eq!(edge.transport(TransportMode::Polling).unwrap().last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn failed_is_reported_once() {
        let mut agg = aggregator();
        assert!(agg.update(TransportMode::Websocket, LinkUpdate::failed(10, "gave up"), Utc::now()).entered_failed);
        assert!(!agg.update(TransportMode::Websocket, LinkUpdate::failed(10, "gave up"), Utc::now()).entered_failed);
        assert_eq!(agg.failed_modes(), vec![TransportMode::Websocket]);

        agg.track(TransportMode::Websocket);
        assert!(agg.failed_modes().is_empty());
    }

    #[test]
    fn connected_stamps_last_connected_at() {
        let mut agg = aggregator();
        let now = Utc::now();
        agg.update(TransportMode::Polling, LinkUpdate::connected(0), now);
        let status = agg.snapshot();
        assert_eq!(status.transport(TransportMode::Polling).unwrap().last_connected_at, Some(now));
        assert!(!status.primary_connected());
    }

    #[test]
    fn untracking_last_connected_mode_is_an_edge() {
        let mut agg = aggregator();
        agg.update(TransportMode::Polling, LinkUpdate::connected(0), Utc::now());
        let edge = agg.untrack(TransportMode::Polling).unwrap();
        assert!(!edge.connected);
        assert!(agg.reset().is_none());
    }

    #[test]
    fn updates_for_untracked_modes_are_ignored() {
        let mut agg = ConnectionStatusAggregator::new(TransportMode::Polling);
        let change = agg.update(TransportMode::Push, LinkUpdate::connected(0), Utc::now());
        assert_eq!(change, StatusChange::default());
        assert!(!agg.is_connected());
    }
}
