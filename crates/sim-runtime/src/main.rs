//! `luna-sim`: run the simulated bus until Ctrl-C.

use anyhow::{Context, Result};
use sim_runtime::{SimConfig, Simulator};
use sim_telemetry::{init_logging, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&TelemetryConfig::from_env()).context("failed to initialize logging")?;

    let config = SimConfig::from_env();
    let simulator = Simulator::start(config).context("failed to start simulator")?;

    info!(
        services = ?simulator.bus().service_names(),
        "Simulator is running. Press Ctrl+C to stop."
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    simulator.shutdown();
    Ok(())
}
