//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests. Jitter is
//! off so timer-driven assertions are exact.

use std::sync::Arc;

use tokio::sync::watch;

use super::feed::ScriptedPollSource;
use super::stream::ScriptedPushHandle;
use crate::adapter::outbound::TokioClock;
use crate::application::transport::DefaultTransportFactory;
use crate::infrastructure::config::{AuthToken, ReconnectConfig, SdkConfig};
use crate::port::outbound::{Credentials, TransportContext};

pub const POLLING_ENDPOINT: &str = "https://api.example.com/api/v1/delivery/deliveries/available_orders/";
pub const WEBSOCKET_ENDPOINT: &str = "wss://api.example.com/ws/orders/";
pub const TOKEN: &str = "test-token";

/// 2 s initial delay doubling to 60 s, 10 attempts, no jitter.
pub fn reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay_ms: 2000,
        max_delay_ms: 60_000,
        max_attempts: 10,
        jitter_ratio: 0.0,
    }
}

/// Both transports enabled, websocket primary, 10 s polling, 30 s dedup window.
pub fn test_config() -> SdkConfig {
    SdkConfig {
        polling_endpoint: POLLING_ENDPOINT.into(),
        websocket_endpoint: WEBSOCKET_ENDPOINT.into(),
        auth_token: Some(AuthToken::new(TOKEN)),
        reconnect: reconnect(),
        ..SdkConfig::default()
    }
}

/// Transport context over [`test_config`] with the tokio clock.
///
/// The returned sender stands in for the coordinator's live config.
pub fn test_context() -> (TransportContext, watch::Sender<Arc<SdkConfig>>) {
    let config = test_config();
    let credentials = Arc::new(Credentials::new(None, config.auth_token.clone()));
    let (tx, rx) = watch::channel(Arc::new(config));
    (
        TransportContext {
            config: rx,
            credentials,
            clock: Arc::new(TokioClock),
        },
        tx,
    )
}

/// Default factory wired to scripted wire doubles.
pub fn scripted_factory(source: &ScriptedPollSource, push: &ScriptedPushHandle) -> DefaultTransportFactory {
    let push = push.clone();
    DefaultTransportFactory::new()
        .with_poll_source(Arc::new(source.clone()))
        .with_stream_builder(move || Box::new(push.stream()))
}
