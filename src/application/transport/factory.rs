use std::fmt;
use std::sync::Arc;

use crate::adapter::outbound::{HttpPollSource, TungsteniteStream};
use crate::domain::TransportMode;
use crate::error::ConfigError;
use crate::port::outbound::{PollSource, PushStream, Transport, TransportContext, TransportFactory};

use super::{PollingTransport, WebSocketTransport};

type StreamBuilder = Arc<dyn Fn() -> Box<dyn PushStream> + Send + Sync>;

/// Builds the HTTP polling and WebSocket transports.
///
/// `push` is an extension point and is not built here.
#[derive(Clone)]
pub struct DefaultTransportFactory {
    poll_source: Arc<dyn PollSource>,
    stream_builder: StreamBuilder,
}

impl DefaultTransportFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_source: Arc::new(HttpPollSource::new()),
            stream_builder: Arc::new(|| Box::new(TungsteniteStream::new()) as Box<dyn PushStream>),
        }
    }

    /// Replace the polling wire client.
    #[must_use]
    pub fn with_poll_source(mut self, source: Arc<dyn PollSource>) -> Self {
        self.poll_source = source;
        self
    }

    /// Replace how socket connections are created; called once per transport.
    #[must_use]
    pub fn with_stream_builder(mut self, builder: impl Fn() -> Box<dyn PushStream> + Send + Sync + 'static) -> Self {
        self.stream_builder = Arc::new(builder);
        self
    }
}

impl Default for DefaultTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultTransportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultTransportFactory").finish_non_exhaustive()
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn supports(&self, mode: TransportMode) -> bool {
        matches!(mode, TransportMode::Polling | TransportMode::Websocket)
    }

    fn create(&self, mode: TransportMode, context: TransportContext) -> Result<Box<dyn Transport>, ConfigError> {
        match mode {
            TransportMode::Polling => Ok(Box::new(PollingTransport::new(self.poll_source.clone(), context))),
            TransportMode::Websocket => Ok(Box::new(WebSocketTransport::new((self.stream_builder)(), context))),
            TransportMode::Push => Err(ConfigError::UnsupportedMode { mode }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::config::test_context;

    #[test]
    fn push_is_unsupported() {
        let factory = DefaultTransportFactory::new();
        let (ctx, _config) = test_context();
        assert!(!factory.supports(TransportMode::Push));
        assert!(matches!(
            factory.create(TransportMode::Push, ctx),
            Err(ConfigError::UnsupportedMode { mode: TransportMode::Push })
        ));
    }

    #[test]
    fn builds_both_transports() {
        let factory = DefaultTransportFactory::new();
        for mode in [TransportMode::Polling, TransportMode::Websocket] {
            let (ctx, _config) = test_context();
            assert_eq!(factory.create(mode, ctx).unwrap().mode(), mode);
        }
    }
}
