//! Outbound ports (driven side): interfaces implemented by outbound adapters.

pub mod auth;
pub mod clock;
pub mod feed;
pub mod transport;

pub use auth::{AuthTokenProvider, Credentials};
pub use clock::Clock;
pub use feed::{ConnectRequest, PollSource, PushStream, StreamMessage};
pub use transport::{
    Shutdown, Signal, SignalKind, Transport, TransportContext, TransportFactory, TransportSink,
};
