//! Built-in transports.
//!
//! Both run as independent tasks, share the backoff policy and report
//! upward only through their [`TransportSink`](crate::port::outbound::TransportSink).

mod factory;
mod polling;
mod websocket;

pub use factory::DefaultTransportFactory;
pub use polling::PollingTransport;
pub use websocket::{connect_url, WebSocketTransport};
