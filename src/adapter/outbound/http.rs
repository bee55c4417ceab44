//! HTTP polling adapter.
//!
//! Issues `GET <endpoint>` with a bearer header and splits the body into
//! order envelopes. Classification of failures matters to the caller:
//! 401/403 is an auth loss, any other non-success status or network error is
//! transient, and an unreadable body is a parse error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{envelope, TransportMode};
use crate::error::{AuthError, Error, TransportError};
use crate::infrastructure::config::AuthToken;
use crate::port::outbound::PollSource;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// reqwest-backed [`PollSource`].
#[derive(Debug, Clone)]
pub struct HttpPollSource {
    http: HttpClient,
}

impl HttpPollSource {
    #[must_use]
    pub fn new() -> Self {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("order-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });
        Self { http }
    }

    /// Use a caller-configured client (proxies, extra roots).
    #[must_use]
    pub const fn with_client(http: HttpClient) -> Self {
        Self { http }
    }
}

impl Default for HttpPollSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PollSource for HttpPollSource {
    async fn fetch(&self, endpoint: &str, token: &AuthToken, timeout: Duration) -> Result<Vec<Value>, Error> {
        let response = self
            .http
            .get(endpoint)
            .bearer_auth(token.expose())
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| classify(err, timeout))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::Rejected {
                mode: TransportMode::Polling,
                status: status.as_u16(),
            }
            .into());
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.text().await.map_err(|err| classify(err, timeout))?;
        debug!(bytes = body.len(), "Fetched pending orders");
        Ok(envelope::decode_batch(&body)?)
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        TransportError::Timeout {
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
        .into()
    } else {
        TransportError::Http(err).into()
    }
}
