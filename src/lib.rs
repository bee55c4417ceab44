//! Order relay - real-time delivery-order notifications over unreliable networks.
//!
//! Two independent transports, interval polling and a persistent WebSocket,
//! run side by side. Their events are deduplicated within a time window and
//! delivered to application callbacks exactly once per window, with bounded
//! exponential-backoff reconnection and edge-only connectivity reporting.
//!
//! # Architecture
//!
//! Hexagonal layout:
//!
//! - [`domain`] - Order events, ids, transport modes, status and metrics types,
//!   envelope decoding. Pure data, no IO.
//! - [`port`] - Inbound callbacks and the outbound seams: token provider,
//!   clock, wire access and the transport plug-in trait.
//! - [`adapter`] - reqwest polling client, tokio-tungstenite socket, tokio clock.
//! - [`application`] - The [`Coordinator`](application::Coordinator), the two
//!   transports, deduplication, backoff, metrics and status aggregation.
//! - [`infrastructure`] - Configuration loading and logging setup.
//! - [`error`] - Error taxonomy: config, auth, transport and parse errors.
//!
//! # Features
//!
//! - `testkit` - Scripted wire doubles and callback recorders for tests.

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
