use std::fs;
use std::path::PathBuf;

use order_relay::domain::TransportMode;
use order_relay::error::{ConfigError, Error};
use order_relay::infrastructure::config::{Config, ConfigPatch};
use tempfile::TempDir;

fn write_temp_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).expect("write temp config");
    path
}

#[test]
fn config_loads_relay_and_logging_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp_config(
        &dir,
        r#"
[logging]
level = "warn"
format = "pretty"

[relay]
enabled_modes = ["polling", "websocket"]
primary_mode = "websocket"
polling_interval_ms = 5000
polling_endpoint = "https://api.example.com/api/v1/delivery/deliveries/available_orders/"
websocket_endpoint = "wss://api.example.com/ws/orders/"
dedup_window_ms = 45000
metrics_enabled = false

[relay.identity]
driver_id = "17"
"#,
    );

    let config = Config::load(&path).unwrap();
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.relay.start_order(), vec![TransportMode::Websocket, TransportMode::Polling]);
    assert_eq!(config.relay.polling_interval_ms, 5000);
    assert_eq!(config.relay.request_timeout().as_millis(), 5000);
    assert_eq!(config.relay.dedup_window_ms, 45_000);
    assert!(!config.relay.metrics_enabled);
    assert_eq!(config.relay.identity["driver_id"], "17");
    assert!(config.relay.auth_token.is_none());
}

#[test]
fn config_defaults_fill_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp_config(
        &dir,
        r#"
[relay]
polling_endpoint = "http://localhost:8000/orders/"
websocket_endpoint = "ws://localhost:8000/ws/orders/"
"#,
    );

    let config = Config::load(&path).unwrap();
    assert_eq!(config.relay.primary_mode, TransportMode::Websocket);
    assert_eq!(config.relay.polling_interval_ms, 10_000);
    assert_eq!(config.relay.dedup_window_ms, 30_000);
    assert_eq!(config.relay.reconnect.initial_delay_ms, 2000);
    assert_eq!(config.relay.reconnect.max_delay_ms, 60_000);
    assert_eq!(config.relay.reconnect.max_attempts, 10);
    assert!(config.relay.metrics_enabled);
}

#[test]
fn config_rejects_primary_outside_enabled_modes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp_config(
        &dir,
        r#"
[relay]
enabled_modes = ["polling"]
primary_mode = "websocket"
polling_endpoint = "https://api.example.com/orders/"
"#,
    );

    assert!(matches!(
        Config::load(&path),
        Err(Error::Config(ConfigError::InvalidValue {
            field: "primary_mode",
            ..
        }))
    ));
}

#[test]
fn config_rejects_too_short_polling_interval() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp_config(
        &dir,
        r#"
[relay]
enabled_modes = ["polling"]
primary_mode = "polling"
polling_interval_ms = 250
polling_endpoint = "https://api.example.com/orders/"
"#,
    );

    assert!(matches!(
        Config::load(&path),
        Err(Error::Config(ConfigError::InvalidValue {
            field: "polling_interval_ms",
            ..
        }))
    ));
}

#[test]
fn config_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Config::load(dir.path().join("absent.toml")),
        Err(Error::Config(ConfigError::ReadFile(_)))
    ));
}

#[test]
fn patch_from_file_config_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp_config(
        &dir,
        r#"
[relay]
polling_endpoint = "https://api.example.com/orders/"
websocket_endpoint = "wss://api.example.com/ws/orders/"
"#,
    );
    let config = Config::load(&path).unwrap();

    let patch = ConfigPatch {
        primary_mode: Some(TransportMode::Polling),
        polling_interval_ms: Some(3000),
        ..ConfigPatch::default()
    };
    let merged = config.relay.merged(&patch).unwrap();
    assert_eq!(merged.primary_mode, TransportMode::Polling);
    assert_eq!(merged.polling_interval_ms, 3000);
    assert_eq!(merged.websocket_endpoint, config.relay.websocket_endpoint);

    let broken = ConfigPatch {
        websocket_endpoint: Some("https://api.example.com/ws/".into()),
        ..ConfigPatch::default()
    };
    assert!(config.relay.merged(&broken).is_err());
}
