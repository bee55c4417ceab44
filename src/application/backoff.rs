//! Shared exponential backoff.
//!
//! `delay(n) = min(initial * 2^(n-1), max) * (1 +/- jitter)` for the n-th
//! consecutive failure. The policy is passed in on every call so a
//! reconfigured `reconnect` section takes effect at the next failure.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::ReconnectConfig;

/// Consecutive-failure counter for one transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    #[must_use]
    pub const fn new() -> Self {
        Self { attempt: 0 }
    }

    /// Consecutive failures since the last confirmed success.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failure and return the jittered delay before the next try.
    ///
    /// Returns `None` once `max_attempts` consecutive failures have been
    /// recorded; the caller must give up.
    pub fn on_failure(&mut self, policy: &ReconnectConfig) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        if self.attempt >= policy.max_attempts {
            return None;
        }
        let base = base_delay(policy, self.attempt - 1);
        Some(jittered(base, policy.jitter_ratio))
    }

    /// Un-jittered delay for the current attempt count.
    ///
    /// A connection that stays up this long counts as sustained.
    #[must_use]
    pub fn cycle_delay(&self, policy: &ReconnectConfig) -> Duration {
        base_delay(policy, self.attempt)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// `min(initial * 2^exponent, max)` without jitter.
#[must_use]
pub fn base_delay(policy: &ReconnectConfig, exponent: u32) -> Duration {
    let factor = 1u64.checked_shl(exponent.min(63)).unwrap_or(u64::MAX);
    let millis = policy
        .initial_delay_ms
        .saturating_mul(factor)
        .min(policy.max_delay_ms);
    Duration::from_millis(millis)
}

/// Spread `base` uniformly over `base * (1 +/- ratio)`.
#[must_use]
pub fn jittered(base: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 || base.is_zero() {
        return base;
    }
    let offset = rand::thread_rng().gen_range(-ratio..=ratio);
    base.mul_f64((1.0 + offset).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter_ratio: f64) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay_ms: 2000,
            max_delay_ms: 60_000,
            max_attempts: 10,
            jitter_ratio,
        }
    }

    #[test]
    fn delays_double_from_initial() {
        let policy = policy(0.0);
        let mut backoff = Backoff::new();
        let delays: Vec<_> = (0..3).filter_map(|_| backoff.on_failure(&policy)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(8000)
            ]
        );
        assert_eq!(backoff.attempt(), 3);
    }

    #[test]
    fn delays_are_non_decreasing_and_capped() {
        let policy = ReconnectConfig {
            max_attempts: 50,
            ..policy(0.0)
        };
        let mut backoff = Backoff::new();
        let mut previous = Duration::ZERO;
        while let Some(delay) = backoff.on_failure(&policy) {
            assert!(delay >= previous);
            assert!(delay <= Duration::from_millis(policy.max_delay_ms));
            previous = delay;
        }
        assert_eq!(previous, Duration::from_millis(60_000));
    }

    #[test]
    fn gives_up_at_max_attempts() {
        let policy = ReconnectConfig {
            max_attempts: 3,
            ..policy(0.0)
        };
        let mut backoff = Backoff::new();
        assert!(backoff.on_failure(&policy).is_some());
        assert!(backoff.on_failure(&policy).is_some());
        assert!(backoff.on_failure(&policy).is_none());
    }

    #[test]
    fn reset_returns_to_initial_delay() {
        let policy = policy(0.0);
        let mut backoff = Backoff::new();
        backoff.on_failure(&policy);
        backoff.on_failure(&policy);
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.on_failure(&policy), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn cycle_delay_tracks_attempt() {
        let policy = policy(0.2);
        let mut backoff = Backoff::new();
        assert_eq!(backoff.cycle_delay(&policy), Duration::from_millis(2000));
        backoff.on_failure(&policy);
        assert_eq!(backoff.cycle_delay(&policy), Duration::from_millis(4000));
    }

    #[test]
    fn jitter_stays_within_ratio() {
        let base = Duration::from_millis(10_000);
        for _ in 0..200 {
            let delay = jittered(base, 0.2);
            assert!(delay >= Duration::from_millis(8000));
            assert!(delay <= Duration::from_millis(12_000));
        }
    }

    #[test]
    fn huge_exponent_saturates() {
        assert_eq!(base_delay(&policy(0.0), 200), Duration::from_millis(60_000));
    }
}
