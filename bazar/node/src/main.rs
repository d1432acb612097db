//! Bazar command line.

mod cli;
mod commands;

use anyhow::Context;
use bc_analytics::Analytics;
use bc_api::BazarApi;
use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let params = cli.params.clone().load().context("Loading configuration")?;

    Analytics::new(params.analytics_params.as_analytics_config()).setup().context("Setting up logging")?;

    tracing::debug!(command = ?cli.command, "Starting bazar {}", env!("CARGO_PKG_VERSION"));

    let api = BazarApi::from_config(params.as_api_config()).context("Building clients")?;

    tokio::select! {
        result = commands::run(&api, cli.command, params.output) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(())
        }
    }
}
