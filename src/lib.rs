// parcel2ndvi - NDVI time-series pipeline over a parcel collection
//
// Data flow: parcel collection -> worker pool enqueues batch indices ->
// each worker submits its batch to the Statistical API, parses, charts,
// and persists per-parcel results -> after the join barrier, crop means
// are aggregated and optional overlay charts rendered.

use std::sync::Arc;

use anyhow::{Context, Result};
use parcel2ndvi_client::{QuerySpec, StatisticalApiClient, StatsApi};
use parcel2ndvi_config::RuntimeConfig;
use parcel2ndvi_pool::WorkerPool;
use parcel2ndvi_render::{PlottersRenderer, ProfileRenderer};
use tracing::info;

mod crop_mean;
mod init;
mod parcels;
mod process;

pub use init::init_tracing;
pub use parcels::{load_parcels, ParcelCollection};
pub use process::NdviBatchProcessor;

/// What a completed run produced. Per-parcel and per-batch failures never
/// surface here; they appear only in the log.
#[derive(Debug)]
pub struct RunSummary {
    pub parcels: usize,
    /// Acknowledged batch indices, in completion order.
    pub batches_completed: Vec<usize>,
    pub crops_written: usize,
    pub overlay_charts: usize,
}

/// Validate the config, connect to the remote API, and run the pipeline
/// with the real client and renderer.
pub async fn run(config: RuntimeConfig) -> Result<RunSummary> {
    config.validate()?;

    let client = StatisticalApiClient::connect(&config.api)
        .await
        .context("failed to connect to the Statistical API")?;
    let renderer = PlottersRenderer::new(
        config.output.graphs_dir(),
        config.output.graphs_with_mean_dir(),
    )
    .with_error_bars(config.output.error_bars);

    run_with(config, client, renderer).await
}

/// Pipeline body with the API client and renderer injected.
pub async fn run_with<A, R>(config: RuntimeConfig, api: A, renderer: R) -> Result<RunSummary>
where
    A: StatsApi + 'static,
    R: ProfileRenderer + 'static,
{
    let collection = parcels::load_parcels(&config.input)?;
    info!(
        parcels = collection.parcels.len(),
        crs = %collection.crs,
        path = %config.input.parcels_path.display(),
        "loaded parcel collection"
    );

    let ndvi_dir = config.output.ndvi_dir();
    std::fs::create_dir_all(&ndvi_dir)
        .with_context(|| format!("failed to create {}", ndvi_dir.display()))?;

    let renderer = Arc::new(renderer);
    let processor = Arc::new(NdviBatchProcessor::new(
        api,
        Arc::clone(&renderer),
        ndvi_dir,
        config.output.plot_title.clone(),
        QuerySpec::from_config(&config.api),
        collection.crs.clone(),
    ));
    let parcels = Arc::new(collection.parcels);

    let pool = WorkerPool::new(config.pool.workers, config.pool.batch_size)
        .with_startup_stagger(config.pool.startup_stagger())
        .with_join_timeout(config.pool.join_timeout());
    let batches_completed = pool.run(Arc::clone(&parcels), processor).await?;

    let means = crop_mean::write_crop_means(&parcels, &config.output)?;
    let crops_written = means.len();

    let overlay_charts = if config.output.group_overlay {
        crop_mean::render_overlays(&parcels, &means, renderer.as_ref(), &config.output)?
    } else {
        0
    };

    Ok(RunSummary {
        parcels: parcels.len(),
        batches_completed,
        crops_written,
        overlay_charts,
    })
}
