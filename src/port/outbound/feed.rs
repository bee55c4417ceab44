//! Wire access used by the built-in transports.
//!
//! [`PollSource`] performs one authenticated fetch of the pending-orders
//! endpoint; [`PushStream`] owns one socket connection at a time and is
//! reconnected by its transport.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::infrastructure::config::AuthToken;

/// One-shot fetch of pending order envelopes.
#[async_trait]
pub trait PollSource: Send + Sync {
    /// Fetch the raw envelopes currently pending at `endpoint`.
    ///
    /// Errors are classified by variant: [`Error::Auth`] when the server
    /// rejects the token, [`Error::Parse`] when the body is not a batch,
    /// [`Error::Transport`] for everything transient.
    async fn fetch(&self, endpoint: &str, token: &AuthToken, timeout: Duration) -> Result<Vec<Value>, Error>;
}

/// Parameters of a socket handshake.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Endpoint including identity and token query parameters.
    pub url: Url,
    pub token: AuthToken,
    pub timeout: Duration,
}

/// What a push stream yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Text(String),
    Closed { reason: String },
}

/// A reconnectable push connection.
#[async_trait]
pub trait PushStream: Send {
    /// Open a connection, replacing any previous one.
    async fn connect(&mut self, request: &ConnectRequest) -> Result<(), Error>;

    /// Next message from the open connection.
    ///
    /// Returns `None` when no connection is open. A lost connection is
    /// reported once as [`StreamMessage::Closed`].
    async fn next_message(&mut self) -> Option<StreamMessage>;

    /// Close the open connection, if any.
    async fn close(&mut self);
}

#[async_trait]
impl PushStream for Box<dyn PushStream> {
    async fn connect(&mut self, request: &ConnectRequest) -> Result<(), Error> {
        (**self).connect(request).await
    }

    async fn next_message(&mut self) -> Option<StreamMessage> {
        (**self).next_message().await
    }

    async fn close(&mut self) {
        (**self).close().await;
    }
}
