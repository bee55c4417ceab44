//! Which transports a config change disturbs.

use std::collections::BTreeSet;

use crate::domain::TransportMode;
use crate::infrastructure::config::SdkConfig;

/// Transports to tear down or rebuild for a config change.
///
/// Modes newly enabled, or currently failed, are started by the caller in
/// addition to what is listed here.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct RestartPlan {
    /// Enabled before, disabled now.
    pub stop: BTreeSet<TransportMode>,
    /// Still enabled, but their connection parameters changed.
    pub restart: BTreeSet<TransportMode>,
}

pub(crate) fn restart_plan(current: &SdkConfig, next: &SdkConfig) -> RestartPlan {
    let stop = current
        .enabled_modes
        .difference(&next.enabled_modes)
        .copied()
        .collect();

    let mut restart = BTreeSet::new();
    if next.is_enabled(TransportMode::Polling)
        && (current.polling_endpoint != next.polling_endpoint
            || current.request_timeout_ms != next.request_timeout_ms)
    {
        restart.insert(TransportMode::Polling);
    }
    if next.is_enabled(TransportMode::Websocket)
        && (current.websocket_endpoint != next.websocket_endpoint
            || current.identity != next.identity
            || current.auth_token != next.auth_token
            || current.request_timeout_ms != next.request_timeout_ms)
    {
        restart.insert(TransportMode::Websocket);
    }

    RestartPlan { stop, restart }
}
