//! Reconnection and retry configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Shared backoff policy for both transports.
///
/// delay(n) = min(initial * 2^(n-1), max) * (1 +/- jitter_ratio)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on the un-jittered delay (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Consecutive failures after which a transport gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fraction of the delay applied as symmetric random jitter.
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

fn default_initial_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    60000 // 1 minute
}

fn default_max_attempts() -> u32 {
    10
}

fn default_jitter_ratio() -> f64 {
    0.2
}

impl ReconnectConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay_ms == 0 {
            return Err(ConfigError::invalid("reconnect.initial_delay_ms", "must be > 0"));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::invalid(
                "reconnect.max_delay_ms",
                "must be >= initial_delay_ms",
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("reconnect.max_attempts", "must be > 0"));
        }
        if !(0.0..1.0).contains(&self.jitter_ratio) {
            return Err(ConfigError::invalid(
                "reconnect.jitter_ratio",
                "must be in [0.0, 1.0)",
            ));
        }
        Ok(())
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}
