//! Trait definitions (hexagonal ports). Depend only on domain and config.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!   Callbacks ◄──────┤      Coordinator        │
//!   (inbound)        │ dedup · status · metrics│
//!                    └───────────┬─────────────┘
//!                                │ TransportFactory
//!               ┌────────────────┼────────────────┐
//!               ▼                ▼                ▼
//!        ┌────────────┐   ┌─────────────┐   ┌──────────┐
//!        │  Polling   │   │  WebSocket  │   │   Push   │
//!        │ PollSource │   │ PushStream  │   │ (extern) │
//!        └────────────┘   └─────────────┘   └──────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`inbound::Callbacks`] - Application-facing notification handlers
//! - [`outbound::Transport`], [`outbound::TransportFactory`] - Transport plug-in seam
//! - [`outbound::PollSource`], [`outbound::PushStream`] - Wire access used by the built-in transports
//! - [`outbound::AuthTokenProvider`] - Bearer token supply
//! - [`outbound::Clock`] - Time and delays

pub mod inbound;
pub mod outbound;
