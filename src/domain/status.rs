use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TransportMode;

/// Connection phase of a single transport.
///
/// `Connecting -> Connected`, or `Connecting -> Reconnecting -> Connected | Failed`.
/// `Failed` is terminal until the coordinator restarts the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A state change reported by a transport.
///
/// Transports only describe what they observed; the aggregator stamps
/// `last_connected_at` when it records the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkUpdate {
    pub status: LinkStatus,
    pub last_error: Option<String>,
    pub reconnect_attempt: u32,
}

impl LinkUpdate {
    #[must_use]
    pub const fn connecting() -> Self {
        Self {
            status: LinkStatus::Connecting,
            last_error: None,
            reconnect_attempt: 0,
        }
    }

    #[must_use]
    pub const fn connected(reconnect_attempt: u32) -> Self {
        Self {
            status: LinkStatus::Connected,
            last_error: None,
            reconnect_attempt,
        }
    }

    /// Link lost; attempt `reconnect_attempt` is scheduled.
    pub fn reconnecting(reconnect_attempt: u32, error: impl ToString) -> Self {
        Self {
            status: LinkStatus::Reconnecting,
            last_error: Some(error.to_string()),
            reconnect_attempt,
        }
    }

    /// Transport gave up after `reconnect_attempt` failures.
    pub fn failed(reconnect_attempt: u32, error: impl ToString) -> Self {
        Self {
            status: LinkStatus::Failed,
            last_error: Some(error.to_string()),
            reconnect_attempt,
        }
    }
}

/// Connection detail for one transport mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConnectionState {
    pub status: LinkStatus,
    pub last_error: Option<String>,
    pub reconnect_attempt: u32,
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl TransportConnectionState {
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self.status, LinkStatus::Connected)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, LinkStatus::Failed)
    }
}

impl Default for TransportConnectionState {
    fn default() -> Self {
        Self {
            status: LinkStatus::Connecting,
            last_error: None,
            reconnect_attempt: 0,
            last_connected_at: None,
        }
    }
}

/// Aggregate connectivity handed to `on_connection_change` and returned by
/// `connection_status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Logical OR of every enabled transport's connectivity.
    pub connected: bool,
    pub primary: TransportMode,
    pub transports: BTreeMap<TransportMode, TransportConnectionState>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn transport(&self, mode: TransportMode) -> Option<&TransportConnectionState> {
        self.transports.get(&mode)
    }

    /// Whether the preferred transport itself is up.
    #[must_use]
    pub fn primary_connected(&self) -> bool {
        self.transport(self.primary)
            .is_some_and(TransportConnectionState::is_connected)
    }
}
