//! Application services: the coordinator and what it coordinates.
//!
//! - [`coordinator`]: lifecycle, reconfiguration and signal dispatch
//! - [`transport`]: polling and WebSocket transports plus their factory
//! - [`dedup`], [`metrics`], [`status`]: state owned by the coordinator
//! - [`backoff`]: the shared reconnect policy

pub mod backoff;
pub mod coordinator;
pub mod dedup;
pub mod metrics;
pub mod status;
pub mod transport;

pub use coordinator::{Coordinator, CoordinatorBuilder, Lifecycle};
