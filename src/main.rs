//! Pokeproxy signed-record routing service.
//!
//! Main entry point. Loads configuration and routing rules, then serves the
//! HTTP API until shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use pokeproxy_api::{load_rules, start_server, AppState, Config};
use pokeproxy_core::StatsStore;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.rust_log);

    info!("Starting pokeproxy");

    let rules_path = config
        .pokeproxy_config
        .as_deref()
        .context("POKEPROXY_CONFIG must point at a rules file")?;
    let rules = load_rules(rules_path)?;

    let addr = config.parse_server_addr()?;
    info!(
        server_addr = %addr,
        rules = rules.len(),
        match_mode = ?config.match_mode,
        max_payload_bytes = config.max_payload_bytes,
        "Configuration loaded"
    );

    let stats = Arc::new(StatsStore::new());
    let state = AppState::from_config(&config, rules, stats)?;

    start_server(state, addr).await.context("Server failed")?;

    info!("Pokeproxy shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
///
/// Falls back to `info` if the configured filter does not parse.
fn init_tracing(filter: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
