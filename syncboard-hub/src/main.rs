//! Syncboard notification hub -- per-board pub/sub channel server.
//!
//! An axum WebSocket server that fans out board change events to every
//! subscriber of a board's channel. Payloads are opaque -- the hub never
//! inspects them, and it keeps no backlog for disconnected subscribers.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9100
//! cargo run --bin syncboard-hub
//!
//! # Run on custom address
//! cargo run --bin syncboard-hub -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! HUB_ADDR=127.0.0.1:8080 cargo run --bin syncboard-hub
//! ```

use std::sync::Arc;

use clap::Parser;
use syncboard_hub::config::{HubCliArgs, HubConfig};
use syncboard_hub::hub::{self, HubState};

#[tokio::main]
async fn main() {
    let cli = HubCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match HubConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting syncboard hub");

    let state = Arc::new(HubState::with_config(
        config.max_channel_name_len,
        config.max_payload_size,
    ));

    match hub::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "hub listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "hub server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start hub server");
            std::process::exit(1);
        }
    }
}
