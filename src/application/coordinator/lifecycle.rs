use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::TransportMode;

/// How long a transport may take to acknowledge shutdown before its task is aborted.
pub const DRAIN_GRACE_PERIOD: Duration = Duration::from_millis(100);

/// Coordinator run state.
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`. `Degraded` is
/// entered from `Running` on a fatal auth error and left only through
/// `start()` or `stop()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Starting,
    Running,
    Stopping,
    Degraded,
}

impl Lifecycle {
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

/// Handle on one spawned transport.
#[derive(Debug)]
pub(crate) struct TransportTask {
    pub mode: TransportMode,
    pub epoch: u64,
    pub shutdown: watch::Sender<bool>,
    pub handle: JoinHandle<()>,
}

impl TransportTask {
    /// Request shutdown and wait for the task, aborting it after the grace period.
    pub async fn drain(mut self) {
        let _ = self.shutdown.send(true);
        match tokio::time::timeout(DRAIN_GRACE_PERIOD, &mut self.handle).await {
            Ok(Ok(())) => debug!(mode = %self.mode, epoch = self.epoch, "Transport drained"),
            Ok(Err(e)) => warn!(mode = %self.mode, error = %e, "Transport task ended abnormally"),
            Err(_) => {
                warn!(mode = %self.mode, epoch = self.epoch, "Transport ignored shutdown, aborting");
                self.handle.abort();
                let _ = self.handle.await;
            }
        }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn unresponsive_task_is_aborted() {
        let (shutdown, _rx) = watch::channel(false);
        let handle = tokio::spawn(std::future::pending::<()>());
        let task = TransportTask {
            mode: TransportMode::Polling,
            epoch: 1,
            shutdown,
            handle,
        };
        task.drain().await;
    }

    #[tokio::test]
    async fn cooperative_task_drains() {
        let (shutdown, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let _ = rx.changed().await;
        });
        let task = TransportTask {
            mode: TransportMode::Websocket,
            epoch: 2,
            shutdown,
            handle,
        };
        task.drain().await;
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Lifecycle::Degraded.to_string(), "degraded");
        assert!(Lifecycle::Running.is_running());
    }
}
