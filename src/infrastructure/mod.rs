//! Infrastructure layer.
//!
//! Configuration loading, validation and logging setup. Nothing here knows
//! about transports or the coordinator beyond the settings they consume.

pub mod config;
