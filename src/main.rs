use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use order_relay::adapter::outbound::StaticTokenProvider;
use order_relay::application::Coordinator;
use order_relay::infrastructure::config::Config;
use order_relay::port::inbound::Callbacks;
use tokio::signal;
use tracing::{error, info, warn};

/// Environment variable holding the bearer token.
const TOKEN_VAR: &str = "ORDER_RELAY_TOKEN";

/// Connect to the order feed and log every notification until Ctrl-C.
#[derive(Parser, Debug)]
#[command(name = "order-relay", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn log_callbacks() -> Callbacks {
    Callbacks::new()
        .on_new_order(|order| info!(id = %order.id, source = %order.source, "New order"))
        .on_order_update(|order| info!(id = %order.id, source = %order.source, "Order updated"))
        .on_connection_change(|status| {
            info!(connected = status.connected, primary = %status.primary, "Connection changed");
        })
        .on_error(|err| {
            if err.requires_reauthentication() {
                error!(error = %err, "Reauthentication required, set {TOKEN_VAR} and restart");
            } else {
                warn!(error = %err, "Relay error");
            }
        })
        .on_metrics(|snapshot| {
            info!(
                received = snapshot.total_received(),
                duplicates = snapshot.total_duplicates_dropped(),
                parse_errors = snapshot.total_parse_errors(),
                "Metrics"
            );
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = rustls::crypto::ring::default_provider().install_default();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.init_logging();
    info!(config = %cli.config.display(), "order-relay starting");

    let mut builder = Coordinator::builder(config.relay).callbacks(log_callbacks());
    if std::env::var_os(TOKEN_VAR).is_some() {
        builder = builder.token_provider(Arc::new(StaticTokenProvider::from_env(TOKEN_VAR)));
    }
    let coordinator = builder.build()?;

    coordinator
        .start()
        .await
        .with_context(|| format!("cannot start, set {TOKEN_VAR} or relay.auth_token"))?;

    signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Shutdown signal received");
    coordinator.stop().await;

    info!("order-relay stopped");
    Ok(())
}
