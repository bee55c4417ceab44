//! Interval polling transport.
//!
//! Single-flight: the next fetch is only scheduled once the previous one has
//! completed, so a slow response makes the transport skip ticks instead of
//! stacking requests. The interval and reconnect policy are re-read from the
//! live config at every scheduling decision.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::application::backoff::{jittered, Backoff};
use crate::domain::{envelope, LinkUpdate, TransportMode};
use crate::error::{AuthError, Error, TransportError};
use crate::infrastructure::config::{SdkConfig, MIN_POLLING_INTERVAL_MS};
use crate::port::outbound::{PollSource, Shutdown, Transport, TransportContext, TransportSink};

enum Outcome {
    Success,
    Failure(TransportError),
    AuthLost(AuthError),
}

pub struct PollingTransport {
    source: Arc<dyn PollSource>,
    context: TransportContext,
    backoff: Backoff,
    connected: bool,
}

impl PollingTransport {
    #[must_use]
    pub fn new(source: Arc<dyn PollSource>, context: TransportContext) -> Self {
        Self {
            source,
            context,
            backoff: Backoff::new(),
            connected: false,
        }
    }

    async fn poll_once(&self, sink: &TransportSink) -> Outcome {
        let config = self.context.settings();
        let token = match self.context.credentials.bearer().await {
            Ok(token) => token,
            Err(e) => return Outcome::AuthLost(e),
        };

        let started = self.context.clock.now();
        let fetched = self
            .source
            .fetch(&config.polling_endpoint, &token, config.request_timeout())
            .await;

        match fetched {
            Ok(items) => {
                sink.record_latency(self.context.clock.now().saturating_duration_since(started));
                debug!(count = items.len(), "Polled pending orders");
                let received_at = self.context.clock.wall_clock();
                for item in items {
                    match envelope::decode_polled(item, received_at) {
                        Ok(event) => sink.emit_event(event),
                        Err(e) => {
                            warn!(error = %e, "Dropping polled entry");
                            sink.report_parse_error(e);
                        }
                    }
                }
                Outcome::Success
            }
            Err(Error::Auth(e)) => Outcome::AuthLost(e),
            Err(Error::Parse(e)) => {
                warn!(error = %e, "Unreadable polling response");
                sink.report_parse_error(e);
                Outcome::Success
            }
            Err(Error::Transport(e)) => Outcome::Failure(e),
            Err(Error::Config(e)) => Outcome::Failure(TransportError::Connection(e.to_string())),
        }
    }

    /// Delay until the next poll, or `None` when the transport must stop.
    fn schedule(&mut self, outcome: Outcome, elapsed: Duration, sink: &TransportSink) -> Option<Duration> {
        let config = self.context.settings();
        match outcome {
            Outcome::Success => {
                if !self.connected || self.backoff.attempt() > 0 {
                    if self.backoff.attempt() > 0 {
                        info!(attempts = self.backoff.attempt(), "Polling recovered");
                    }
                    self.backoff.reset();
                    self.connected = true;
                    sink.report_link(LinkUpdate::connected(0));
                }
                let interval = poll_interval(&config);
                if elapsed < interval {
                    return Some(interval - elapsed);
                }
                let interval_ns = interval.as_nanos().max(1);
                let overrun = Duration::from_nanos(
                    u64::try_from(elapsed.as_nanos() % interval_ns).unwrap_or_default(),
                );
                debug!(elapsed_ms = elapsed.as_millis(), "Poll overran its interval, skipping tick");
                Some(interval.saturating_sub(overrun))
            }
            Outcome::Failure(err) => {
                self.connected = false;
                let message = err.to_string();
                sink.report_error(err);
                match self.backoff.on_failure(&config.reconnect) {
                    Some(delay) => {
                        warn!(
                            error = %message,
                            attempt = self.backoff.attempt(),
                            delay_ms = delay.as_millis(),
                            "Poll failed, backing off"
                        );
                        sink.report_link(LinkUpdate::reconnecting(self.backoff.attempt(), message));
                        Some(delay)
                    }
                    None => {
                        let attempts = self.backoff.attempt();
                        warn!(error = %message, attempts, "Polling gave up");
                        sink.report_link(LinkUpdate::failed(attempts, message));
                        sink.report_error(TransportError::Exhausted { attempts });
                        None
                    }
                }
            }
            Outcome::AuthLost(err) => {
                warn!(error = %err, "Polling lost authorization");
                sink.auth_lost(err);
                None
            }
        }
    }
}

#[async_trait]
impl Transport for PollingTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Polling
    }

    async fn run(&mut self, sink: TransportSink, mut shutdown: Shutdown) {
        info!(epoch = sink.epoch(), "Polling transport started");
        sink.report_link(LinkUpdate::connecting());
        let clock = self.context.clock.clone();

        loop {
            let started = clock.now();
            let outcome = tokio::select! {
                _ = shutdown.triggered() => break,
                outcome = self.poll_once(&sink) => outcome,
            };
            if shutdown.is_triggered() {
                break;
            }

            let elapsed = clock.now().saturating_duration_since(started);
            let Some(wait) = self.schedule(outcome, elapsed, &sink) else {
                break;
            };

            tokio::select! {
                _ = shutdown.triggered() => break,
                _ = clock.sleep(wait) => {}
            }
        }

        debug!(epoch = sink.epoch(), "Polling transport stopped");
    }
}

/// Jittered interval, never below the enforced minimum.
fn poll_interval(config: &SdkConfig) -> Duration {
    jittered(config.polling_interval(), config.reconnect.jitter_ratio)
        .max(Duration::from_millis(MIN_POLLING_INTERVAL_MS))
}
