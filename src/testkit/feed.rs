//! Scripted polling endpoint.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::domain::TransportMode;
use crate::error::{AuthError, Error, ParseError, TransportError};
use crate::infrastructure::config::AuthToken;
use crate::port::outbound::PollSource;

#[derive(Default)]
struct State {
    script: Mutex<VecDeque<Result<Vec<Value>, Error>>>,
    fallback: Mutex<Vec<Value>>,
    latency: Mutex<Duration>,
    tokens: Mutex<Vec<String>>,
    calls: AtomicU32,
    in_flight: AtomicU32,
    max_concurrent: AtomicU32,
}

/// A [`PollSource`] that replays queued responses.
///
/// Each `fetch()` pops the next scripted result; once the script is empty
/// it returns the fallback batch (empty unless set). Clones share state, so
/// tests keep one clone and hand another to the transport.
#[derive(Clone, Default)]
pub struct ScriptedPollSource {
    state: Arc<State>,
}

impl ScriptedPollSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, batch: Vec<Value>) {
        self.state.script.lock().push_back(Ok(batch));
    }

    pub fn push_err(&self, err: TransportError) {
        self.state.script.lock().push_back(Err(err.into()));
    }

    pub fn push_parse_error(&self, err: ParseError) {
        self.state.script.lock().push_back(Err(err.into()));
    }

    pub fn push_auth_rejected(&self, status: u16) {
        self.state.script.lock().push_back(Err(AuthError::Rejected {
            mode: TransportMode::Polling,
            status,
        }
        .into()));
    }

    /// Batch returned whenever the script is exhausted.
    pub fn set_fallback(&self, batch: Vec<Value>) {
        *self.state.fallback.lock() = batch;
    }

    /// Delay every fetch by `latency` (tokio time).
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock() = latency;
    }

    pub fn calls(&self) -> u32 {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed in flight at once.
    pub fn max_concurrent(&self) -> u32 {
        self.state.max_concurrent.load(Ordering::SeqCst)
    }

    /// Bearer tokens presented, in call order.
    pub fn tokens(&self) -> Vec<String> {
        self.state.tokens.lock().clone()
    }
}

struct InFlight<'a>(&'a AtomicU32);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PollSource for ScriptedPollSource {
    async fn fetch(&self, _endpoint: &str, token: &AuthToken, _timeout: Duration) -> Result<Vec<Value>, Error> {
        let state = &self.state;
        state.calls.fetch_add(1, Ordering::SeqCst);
        state.tokens.lock().push(token.expose().to_string());
        let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_concurrent.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&state.in_flight);

        let latency = *state.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let next = state.script.lock().pop_front();
        next.unwrap_or_else(|| Ok(state.fallback.lock().clone()))
    }
}
