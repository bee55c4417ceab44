use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::port::outbound::Clock;

/// Clock backed by tokio's timer, so paused-time tests drive it too.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_paused_time() {
        let clock = TokioClock;
        let before = clock.now();
        clock.sleep(Duration::from_secs(30)).await;
        assert_eq!(clock.now() - before, Duration::from_secs(30));
    }
}
