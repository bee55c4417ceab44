//! Runtime settings owned by the coordinator.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::reconnect::ReconnectConfig;
use crate::domain::TransportMode;
use crate::error::ConfigError;

/// Lowest accepted polling interval (milliseconds).
pub const MIN_POLLING_INTERVAL_MS: u64 = 1000;

/// Bearer token pushed by the application.
///
/// `Debug` output is redacted so the token never reaches logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Non-empty and free of whitespace. The core never decodes tokens.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && !self.0.chars().any(char::is_whitespace)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Coordinator configuration.
///
/// Owned exclusively by the coordinator and changed only through
/// `update_config`; transports read it, never write it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Transports run concurrently while the coordinator is running.
    #[serde(default = "default_enabled_modes")]
    pub enabled_modes: BTreeSet<TransportMode>,

    /// Preferred transport; must be enabled.
    #[serde(default = "default_primary_mode")]
    pub primary_mode: TransportMode,

    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    #[serde(default)]
    pub polling_endpoint: String,

    #[serde(default)]
    pub websocket_endpoint: String,

    /// Token pushed by the application. When absent the token provider is asked.
    #[serde(default)]
    pub auth_token: Option<AuthToken>,

    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,

    /// Upper bound on remembered event ids.
    #[serde(default = "default_dedup_max_entries")]
    pub dedup_max_entries: usize,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    /// Period of `on_metrics` emission and of the dedup sweep.
    #[serde(default = "default_metrics_interval_ms")]
    pub metrics_interval_ms: u64,

    /// Bound on each HTTP fetch and socket handshake. Defaults to the polling interval.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Identity query parameters appended to the socket URL (driver id, tenant, ...).
    #[serde(default)]
    pub identity: BTreeMap<String, String>,
}

fn default_enabled_modes() -> BTreeSet<TransportMode> {
    BTreeSet::from([TransportMode::Polling, TransportMode::Websocket])
}

fn default_primary_mode() -> TransportMode {
    TransportMode::Websocket
}

const fn default_polling_interval_ms() -> u64 {
    10_000
}

const fn default_dedup_window_ms() -> u64 {
    30_000
}

const fn default_dedup_max_entries() -> usize {
    10_000
}

const fn default_metrics_enabled() -> bool {
    true
}

const fn default_metrics_interval_ms() -> u64 {
    60_000
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            enabled_modes: default_enabled_modes(),
            primary_mode: default_primary_mode(),
            polling_interval_ms: default_polling_interval_ms(),
            polling_endpoint: String::new(),
            websocket_endpoint: String::new(),
            auth_token: None,
            dedup_window_ms: default_dedup_window_ms(),
            dedup_max_entries: default_dedup_max_entries(),
            reconnect: ReconnectConfig::default(),
            metrics_enabled: default_metrics_enabled(),
            metrics_interval_ms: default_metrics_interval_ms(),
            request_timeout_ms: None,
            identity: BTreeMap::new(),
        }
    }
}

impl SdkConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found:
    /// - at least one mode must be enabled and `primary_mode` must be one of them
    /// - `polling_interval_ms` must be >= [`MIN_POLLING_INTERVAL_MS`]
    /// - enabled transports need a parseable endpoint with a matching scheme
    /// - `dedup_window_ms`, `dedup_max_entries`, `metrics_interval_ms` must be > 0
    /// - a pushed `auth_token` must be well formed
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled_modes.is_empty() {
            return Err(ConfigError::invalid("enabled_modes", "at least one mode required"));
        }
        if !self.enabled_modes.contains(&self.primary_mode) {
            return Err(ConfigError::invalid(
                "primary_mode",
                format!("'{}' is not in enabled_modes", self.primary_mode),
            ));
        }
        if self.polling_interval_ms < MIN_POLLING_INTERVAL_MS {
            return Err(ConfigError::invalid(
                "polling_interval_ms",
                format!("must be >= {MIN_POLLING_INTERVAL_MS}"),
            ));
        }
        if self.is_enabled(TransportMode::Polling) {
            validate_endpoint("polling_endpoint", &self.polling_endpoint, &["http", "https"])?;
        }
        if self.is_enabled(TransportMode::Websocket) {
            validate_endpoint("websocket_endpoint", &self.websocket_endpoint, &["ws", "wss"])?;
        }
        if self.dedup_window_ms == 0 {
            return Err(ConfigError::invalid("dedup_window_ms", "must be > 0"));
        }
        if self.dedup_max_entries == 0 {
            return Err(ConfigError::invalid("dedup_max_entries", "must be > 0"));
        }
        if self.metrics_interval_ms == 0 {
            return Err(ConfigError::invalid("metrics_interval_ms", "must be > 0"));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::invalid("request_timeout_ms", "must be > 0"));
        }
        if let Some(token) = &self.auth_token {
            if !token.is_well_formed() {
                return Err(ConfigError::invalid("auth_token", "must be non-empty without whitespace"));
            }
        }
        self.reconnect.validate()
    }

    #[must_use]
    pub fn is_enabled(&self, mode: TransportMode) -> bool {
        self.enabled_modes.contains(&mode)
    }

    /// Enabled modes with the primary first.
    #[must_use]
    pub fn start_order(&self) -> Vec<TransportMode> {
        let mut modes = vec![self.primary_mode];
        modes.extend(
            self.enabled_modes
                .iter()
                .copied()
                .filter(|mode| *mode != self.primary_mode),
        );
        modes
    }

    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(self.polling_interval_ms))
    }

    #[must_use]
    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    #[must_use]
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }
}

fn validate_endpoint(field: &'static str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    let url = Url::parse(value).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::invalid(
            field,
            format!("scheme must be one of {}", schemes.join(", ")),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SdkConfig {
        SdkConfig {
            polling_endpoint: "https://api.example.com/api/v1/delivery/deliveries/available_orders/".into(),
            websocket_endpoint: "wss://api.example.com/ws/driver/".into(),
            ..Default::default()
        }
    }

    #[test]
    fn default_needs_endpoints() {
        assert!(matches!(
            SdkConfig::default().validate(),
            Err(ConfigError::MissingField {
                field: "polling_endpoint"
            })
        ));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn primary_must_be_enabled() {
        let config = SdkConfig {
            enabled_modes: BTreeSet::from([TransportMode::Polling]),
            primary_mode: TransportMode::Websocket,
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "primary_mode",
                ..
            })
        ));
    }

    #[test]
    fn disabled_transport_endpoint_is_not_checked() {
        let config = SdkConfig {
            enabled_modes: BTreeSet::from([TransportMode::Polling]),
            primary_mode: TransportMode::Polling,
            websocket_endpoint: String::new(),
            ..valid()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn endpoint_scheme_must_match_transport() {
        let config = SdkConfig {
            websocket_endpoint: "https://api.example.com/ws/".into(),
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "websocket_endpoint",
                ..
            })
        ));
    }

    #[test]
    fn polling_interval_floor_is_enforced() {
        let config = SdkConfig {
            polling_interval_ms: MIN_POLLING_INTERVAL_MS - 1,
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn start_order_puts_primary_first() {
        let config = SdkConfig {
            primary_mode: TransportMode::Websocket,
            ..valid()
        };
        assert_eq!(
            config.start_order(),
            vec![TransportMode::Websocket, TransportMode::Polling]
        );
    }

    #[test]
    fn request_timeout_defaults_to_polling_interval() {
        let mut config = valid();
        assert_eq!(config.request_timeout(), Duration::from_millis(10_000));
        config.request_timeout_ms = Some(2500);
        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn token_is_redacted_in_debug() {
        let config = SdkConfig {
            auth_token: Some(AuthToken::new("secret-value")),
            ..valid()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("AuthToken(***)"));
    }

    #[test]
    fn malformed_pushed_token_is_rejected() {
        let config = SdkConfig {
            auth_token: Some(AuthToken::new("two words")),
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "auth_token",
                ..
            })
        ));
    }
}
