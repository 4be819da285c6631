//! Per-batch processing: submit, parse, chart, persist
//!
//! Failure granularity follows the queue design: a batch-level request
//! failure skips the whole batch (no partial artifacts), a per-parcel
//! failure skips that parcel only. Neither reaches the coordinator's
//! caller; both appear in the log.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parcel2ndvi_client::{QuerySpec, StatsApi};
use parcel2ndvi_core::{parse_statistics, NdviProfile, Parcel, ProfilePoint};
use parcel2ndvi_pool::{BatchProcessor, BatchSlice};
use parcel2ndvi_render::{ChartJob, ProfileRenderer, RenderOutcome};
use serde_json::Value;
use tracing::{error, info};

pub struct NdviBatchProcessor<A, R> {
    api: A,
    renderer: Arc<R>,
    ndvi_dir: PathBuf,
    plot_title: String,
    query: QuerySpec,
    crs: String,
}

impl<A, R> NdviBatchProcessor<A, R> {
    pub fn new(
        api: A,
        renderer: Arc<R>,
        ndvi_dir: PathBuf,
        plot_title: String,
        query: QuerySpec,
        crs: String,
    ) -> Self {
        Self {
            api,
            renderer,
            ndvi_dir,
            plot_title,
            query,
            crs,
        }
    }
}

impl<A, R> NdviBatchProcessor<A, R>
where
    A: StatsApi,
    R: ProfileRenderer,
{
    /// Parse one parcel's response, render its chart, then write its CSV.
    /// The chart comes first so a failed parcel leaves no artifact behind.
    fn process_parcel(&self, parcel: &Parcel, raw: &Value) -> Result<()> {
        let start = Instant::now();

        let records = parse_statistics(raw)
            .with_context(|| format!("parsing response for parcel {}", parcel.id))?;
        let profile = NdviProfile::from_records(&records);

        let job = ChartJob {
            parcel_id: &parcel.id,
            crop: &parcel.crop,
            title: &self.plot_title,
            points: &profile.points,
            group_mean: None,
        };
        match self
            .renderer
            .render(&job)
            .with_context(|| format!("rendering chart for parcel {}", parcel.id))?
        {
            RenderOutcome::Produced(path) => {
                info!(parcel = %parcel.id, chart = %path.display(), "chart rendered");
            }
            RenderOutcome::Skipped(reason) => {
                info!(parcel = %parcel.id, %reason, "chart skipped");
            }
        }

        let csv_path = profile_csv_path(&self.ndvi_dir, &parcel.id);
        write_profile_csv(&csv_path, &profile.points)
            .with_context(|| format!("writing CSV for parcel {}", parcel.id))?;

        info!(
            parcel = %parcel.id,
            rows = profile.points.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "parcel processed"
        );
        Ok(())
    }
}

#[async_trait]
impl<A, R> BatchProcessor<Parcel> for NdviBatchProcessor<A, R>
where
    A: StatsApi,
    R: ProfileRenderer,
{
    async fn process(&self, batch: BatchSlice<'_, Parcel>) -> Result<()> {
        let start = Instant::now();

        let geometries: Vec<Value> = batch
            .items
            .iter()
            .map(|parcel| parcel.geometry.clone())
            .collect();
        let responses = self
            .api
            .submit(&geometries, &self.crs, &self.query)
            .await
            .with_context(|| format!("statistics request for batch {} failed", batch.index))?;

        for (parcel, raw) in batch.items.iter().zip(&responses) {
            if let Err(err) = self.process_parcel(parcel, raw) {
                error!(parcel = %parcel.id, error = format!("{err:#}"), "parcel failed, skipping");
            }
        }

        info!(
            batch = batch.index,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch complete"
        );
        Ok(())
    }
}

pub(crate) fn profile_csv_path(dir: &Path, parcel_id: &str) -> PathBuf {
    dir.join(format!("{parcel_id}_ndvi.csv"))
}

pub(crate) fn write_profile_csv(path: &Path, points: &[ProfilePoint]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for point in points {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

pub(crate) fn read_profile_csv(path: &Path) -> Result<Vec<ProfilePoint>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut points = Vec::new();
    for row in reader.deserialize() {
        points.push(row?);
    }
    Ok(points)
}
