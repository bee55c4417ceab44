//! Channel-driven [`PushStream`] with an external control handle.
//!
//! Every stream built from one [`ScriptedPushHandle`] shares its counters,
//! so a test can assert how many sockets are open across restarts. Messages
//! sent through the handle go to the most recently opened connection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::TransportMode;
use crate::error::{AuthError, Error, TransportError};
use crate::port::outbound::{ConnectRequest, PushStream, StreamMessage};

#[derive(Default)]
struct State {
    failures: Mutex<VecDeque<Error>>,
    current: Mutex<Option<mpsc::UnboundedSender<StreamMessage>>>,
    requests: Mutex<Vec<String>>,
    connects: AtomicU32,
    open: AtomicU32,
}

/// Control side of one or more [`ScriptedPushStream`]s.
#[derive(Clone, Default)]
pub struct ScriptedPushHandle {
    state: Arc<State>,
}

/// A [`PushStream`] fed by its [`ScriptedPushHandle`].
pub struct ScriptedPushStream {
    state: Arc<State>,
    rx: Option<mpsc::UnboundedReceiver<StreamMessage>>,
}

impl ScriptedPushStream {
    /// Create a stream and its control handle.
    pub fn new() -> (Self, ScriptedPushHandle) {
        let handle = ScriptedPushHandle::default();
        (handle.stream(), handle)
    }

    fn release(&mut self) {
        if self.rx.take().is_some() {
            self.state.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl ScriptedPushHandle {
    /// Another stream sharing this handle.
    pub fn stream(&self) -> ScriptedPushStream {
        ScriptedPushStream {
            state: self.state.clone(),
            rx: None,
        }
    }

    /// Deliver a text frame to the newest open connection.
    pub fn send_text(&self, text: &str) {
        if let Some(tx) = self.state.current.lock().as_ref() {
            let _ = tx.send(StreamMessage::Text(text.to_string()));
        }
    }

    /// Close the newest connection from the server side.
    pub fn drop_connection(&self, reason: &str) {
        if let Some(tx) = self.state.current.lock().take() {
            let _ = tx.send(StreamMessage::Closed {
                reason: reason.to_string(),
            });
        }
    }

    pub fn fail_next_connect(&self, err: TransportError) {
        self.state.failures.lock().push_back(err.into());
    }

    /// Refuse the next handshake with an HTTP status (401/403 mean auth loss).
    pub fn reject_next_connect(&self, status: u16) {
        self.state.failures.lock().push_back(
            AuthError::Rejected {
                mode: TransportMode::Websocket,
                status,
            }
            .into(),
        );
    }

    /// Total `connect()` calls, successful or not.
    pub fn connects(&self) -> u32 {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Connections currently open across all streams of this handle.
    pub fn open_connections(&self) -> u32 {
        self.state.open.load(Ordering::SeqCst)
    }

    /// URLs of every connect attempt.
    pub fn requested_urls(&self) -> Vec<String> {
        self.state.requests.lock().clone()
    }
}

#[async_trait]
impl PushStream for ScriptedPushStream {
    async fn connect(&mut self, request: &ConnectRequest) -> Result<(), Error> {
        self.release();
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.requests.lock().push(request.url.to_string());

        let failure = self.state.failures.lock().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.current.lock() = Some(tx);
        self.rx = Some(rx);
        self.state.open.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_message(&mut self) -> Option<StreamMessage> {
        let message = self.rx.as_mut()?.recv().await;
        match message {
            Some(StreamMessage::Text(text)) => Some(StreamMessage::Text(text)),
            Some(closed) => {
                self.release();
                Some(closed)
            }
            None => {
                self.release();
                Some(StreamMessage::Closed {
                    reason: "superseded by a newer connection".to_string(),
                })
            }
        }
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl Drop for ScriptedPushStream {
    fn drop(&mut self) {
        self.release();
    }
}
