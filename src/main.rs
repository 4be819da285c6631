// Single-run CLI entry: load config, initialize logging, run the pipeline.

use anyhow::Result;
use clap::Parser;
use parcel2ndvi_config::RuntimeConfig;

#[derive(Parser)]
#[command(
    name = "parcel2ndvi",
    about = "NDVI time-series pipeline over a parcel collection",
    version
)]
struct Cli {
    /// Path to a TOML config file (default: ./config.toml, ./.parcel2ndvi.toml)
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load_from_file_path(path)?,
        None => RuntimeConfig::load()?,
    };

    parcel2ndvi::init_tracing(&config.logging)?;

    let summary = parcel2ndvi::run(config).await?;
    tracing::info!(
        parcels = summary.parcels,
        batches = summary.batches_completed.len(),
        crops = summary.crops_written,
        overlays = summary.overlay_charts,
        "run complete"
    );
    Ok(())
}
