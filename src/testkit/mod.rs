//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`feed`]: [`ScriptedPollSource`](feed::ScriptedPollSource), a scripted polling endpoint
//! - [`stream`]: [`ScriptedPushStream`](stream::ScriptedPushStream) and its control handle
//! - [`clock`]: [`ManualClock`](clock::ManualClock) for timer-free unit tests
//! - [`observer`]: [`RecordingCallbacks`](observer::RecordingCallbacks) captures every callback
//! - [`config`]: canonical test configurations and a ready-made transport factory

pub mod clock;
pub mod config;
pub mod feed;
pub mod observer;
pub mod stream;
