//! Exam Integrity Server - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, IntegrityConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var("INTEGRITY_CONFIG").unwrap_or_else(|_| "integrity".to_string());
    let config = IntegrityConfig::load(Some(&path)).context("failed to load configuration")?;

    init_logging(&config.logging);

    info!("=== Exam Integrity Server v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        auto_submit_threshold = config.ledger.auto_submit_threshold,
        database = %config.server.database_url,
        "Configuration loaded"
    );

    run_server(config).await.context("server terminated")?;

    Ok(())
}
