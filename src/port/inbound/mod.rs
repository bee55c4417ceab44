//! Inbound (driving) ports.
//!
//! The application drives the relay through the
//! [`Coordinator`](crate::application::Coordinator) and is called back through
//! the handlers registered in [`Callbacks`].

mod callbacks;

pub use callbacks::{Callbacks, Handler, Notification};
