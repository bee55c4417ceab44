//! Partial configuration updates.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer};

use super::reconnect::ReconnectConfig;
use super::relay::{AuthToken, SdkConfig};
use crate::domain::TransportMode;
use crate::error::ConfigError;

/// Fields to change on the active [`SdkConfig`]. `None` keeps the current value.
///
/// The optional settings take `Some(None)` (JSON `null`) to clear them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub enabled_modes: Option<BTreeSet<TransportMode>>,
    pub primary_mode: Option<TransportMode>,
    pub polling_interval_ms: Option<u64>,
    pub polling_endpoint: Option<String>,
    pub websocket_endpoint: Option<String>,
    #[serde(deserialize_with = "clearable")]
    pub auth_token: Option<Option<AuthToken>>,
    pub dedup_window_ms: Option<u64>,
    pub dedup_max_entries: Option<usize>,
    pub reconnect: Option<ReconnectConfig>,
    pub metrics_enabled: Option<bool>,
    pub metrics_interval_ms: Option<u64>,
    /// `Some(None)` falls back to the polling interval.
    #[serde(deserialize_with = "clearable")]
    pub request_timeout_ms: Option<Option<u64>>,
    pub identity: Option<BTreeMap<String, String>>,
}

/// Present-but-null becomes `Some(None)`; an absent field stays `None` via `#[serde(default)]`.
fn clearable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ConfigPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl SdkConfig {
    /// Merge `patch` into a copy of this config and validate the result.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the merged config is invalid; `self` is
    /// left untouched either way.
    pub fn merged(&self, patch: &ConfigPatch) -> Result<SdkConfig, ConfigError> {
        let mut next = self.clone();

        if let Some(modes) = &patch.enabled_modes {
            next.enabled_modes = modes.clone();
        }
        if let Some(primary) = patch.primary_mode {
            next.primary_mode = primary;
        }
        if let Some(interval) = patch.polling_interval_ms {
            next.polling_interval_ms = interval;
        }
        if let Some(endpoint) = &patch.polling_endpoint {
            next.polling_endpoint = endpoint.clone();
        }
        if let Some(endpoint) = &patch.websocket_endpoint {
            next.websocket_endpoint = endpoint.clone();
        }
        if let Some(token) = &patch.auth_token {
            next.auth_token = token.clone();
        }
        if let Some(window) = patch.dedup_window_ms {
            next.dedup_window_ms = window;
        }
        if let Some(max_entries) = patch.dedup_max_entries {
            next.dedup_max_entries = max_entries;
        }
        if let Some(reconnect) = &patch.reconnect {
            next.reconnect = reconnect.clone();
        }
        if let Some(enabled) = patch.metrics_enabled {
            next.metrics_enabled = enabled;
        }
        if let Some(interval) = patch.metrics_interval_ms {
            next.metrics_interval_ms = interval;
        }
        if let Some(timeout) = patch.request_timeout_ms {
            next.request_timeout_ms = timeout;
        }
        if let Some(identity) = &patch.identity {
            next.identity = identity.clone();
        }

        next.validate()?;
        Ok(next)
    }
}
