//! Transport-agnostic domain types.
//!
//! Everything here is plain data plus pure functions: order events and their
//! ids, the transport modes, per-transport connection state and the metrics
//! snapshot handed to the application. No IO happens in this module.

pub mod envelope;
mod event;
mod id;
mod metrics;
mod mode;
mod status;

pub use event::{EventKind, OrderEvent};
pub use id::OrderId;
pub use metrics::{MetricsSnapshot, TransportMetrics};
pub use mode::TransportMode;
pub use status::{ConnectionStatus, LinkStatus, LinkUpdate, TransportConnectionState};
