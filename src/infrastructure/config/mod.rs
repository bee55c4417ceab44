//! Configuration types.
//!
//! - [`relay`] - Runtime settings owned by the coordinator (`SdkConfig`)
//! - [`reconnect`] - Shared backoff policy settings
//! - [`patch`] - Partial updates applied through `update_config`
//! - [`logging`] - Tracing subscriber setup
//! - [`settings`] - Root of the TOML file loaded by the runner binary

pub mod logging;
pub mod patch;
pub mod reconnect;
pub mod relay;
pub mod settings;

pub use logging::LoggingConfig;
pub use patch::ConfigPatch;
pub use reconnect::ReconnectConfig;
pub use relay::{AuthToken, SdkConfig, MIN_POLLING_INTERVAL_MS};
pub use settings::Config;
