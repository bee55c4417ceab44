//! Outbound adapters (driven side).
//!
//! - [`http`]: reqwest-backed [`PollSource`](crate::port::outbound::PollSource)
//! - [`websocket`]: tokio-tungstenite-backed [`PushStream`](crate::port::outbound::PushStream)
//! - [`clock`]: tokio timer [`Clock`](crate::port::outbound::Clock)
//! - [`auth`]: static and environment token providers

pub mod auth;
pub mod clock;
pub mod http;
pub mod websocket;

pub use auth::StaticTokenProvider;
pub use clock::TokioClock;
pub use http::HttpPollSource;
pub use websocket::TungsteniteStream;
