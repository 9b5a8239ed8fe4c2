//! Vault liquidation keeper - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Vault liquidation keeper
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via KEEPER_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    keeper_telemetry::init_logging()?;

    info!("Starting vault keeper v{}", env!("CARGO_PKG_VERSION"));

    let config = keeper_bot::KeeperConfig::load(args.config)?;
    info!(
        chain_id = config.rpc.chain_id,
        factory = %config.contracts.factory,
        min_ratio_pct = config.monitoring.min_collateral_ratio_pct,
        "Configuration loaded"
    );

    let app = keeper_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
