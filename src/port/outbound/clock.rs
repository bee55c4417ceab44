//! Time source and delays.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Abstraction over "now" and scheduled delays so timing can be faked in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic now.
    fn now(&self) -> Instant;

    /// Wall-clock now, used to stamp received events.
    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration);
}
