//! The single serialization point for transport signals.
//!
//! One dispatcher task per run drains the mailbox. Each signal is handled
//! under the coordinator gate, so nothing it delivers can interleave with
//! `start`, `stop` or `update_config`. The same task drives the periodic
//! dedup sweep and metrics emission.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::state::Shared;
use crate::port::inbound::Notification;
use crate::port::outbound::{Shutdown, Signal};

pub(crate) async fn run(shared: Arc<Shared>, run: u64, mut mailbox: mpsc::UnboundedReceiver<Signal>, mut shutdown: Shutdown) {
    debug!(run, "Dispatcher started");
    let clock = shared.clock.clone();
    let mut config = shared.config.subscribe();
    let mut period = config.borrow_and_update().metrics_interval();
    let mut tick = clock.sleep(period);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            signal = mailbox.recv() => {
                let Some(signal) = signal else { break };
                let _gate = shared.gate.lock().await;
                if !shared.is_current(run) {
                    break;
                }
                let mut notifications = Vec::new();
                if let Some(err) = shared.process(signal, &mut notifications) {
                    shared.deliver(notifications);
                    shared.degrade(run, err).await;
                    break;
                }
                shared.deliver(notifications);
            }
            changed = config.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = config.borrow_and_update().metrics_interval();
                if next != period {
                    trace!(interval_ms = next.as_millis(), "Metrics interval changed");
                    period = next;
                    tick = clock.sleep(period);
                }
            }
            () = &mut tick => {
                tick = clock.sleep(period);
                let _gate = shared.gate.lock().await;
                if !shared.is_current(run) {
                    break;
                }
                shared.dedup.gc();
                if shared.metrics.is_enabled() {
                    shared.deliver(vec![Notification::Metrics(shared.metrics.snapshot())]);
                }
            }
        }
    }

    debug!(run, "Dispatcher stopped");
}
