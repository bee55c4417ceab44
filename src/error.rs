use thiserror::Error;

use crate::domain::TransportMode;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("transport mode '{mode}' is not supported")]
    UnsupportedMode { mode: TransportMode },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Credential failures. Fatal to the current run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("auth unavailable")]
    Unavailable,

    #[error("auth token is malformed")]
    Malformed,

    #[error("{mode} endpoint rejected credentials (HTTP {status})")]
    Rejected { mode: TransportMode, status: u16 },
}

/// Transient network and IO failures. Retried locally with backoff.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("connection closed: {reason}")]
    Closed { reason: String },

    #[error("server reported error: {0}")]
    Server(String),

    #[error("gave up after {attempts} consecutive failures")]
    Exhausted { attempts: u32 },

    #[error("connection error: {0}")]
    Connection(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocket(Box::new(err))
    }
}

/// Malformed server payloads. The offending event is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("expected {expected}")]
    UnexpectedShape { expected: &'static str },

    #[error("message has no type tag")]
    MissingType,

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("order envelope has no resolvable id")]
    MissingId,
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::InvalidJson(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Error {
    /// True when the application must refresh credentials and call `start()` again.
    #[must_use]
    pub const fn requires_reauthentication(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(err.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_unavailable_message_is_stable() {
        assert_eq!(AuthError::Unavailable.to_string(), "auth unavailable");
    }

    #[test]
    fn only_auth_errors_require_reauthentication() {
        assert!(Error::from(AuthError::Unavailable).requires_reauthentication());
        assert!(!Error::from(ParseError::MissingId).requires_reauthentication());
        assert!(!Error::from(TransportError::Timeout { after_ms: 10 }).requires_reauthentication());
    }

    #[test]
    fn rejected_names_the_mode() {
        let err = AuthError::Rejected {
            mode: TransportMode::Websocket,
            status: 401,
        };
        assert_eq!(
            err.to_string(),
            "websocket endpoint rejected credentials (HTTP 401)"
        );
    }
}
