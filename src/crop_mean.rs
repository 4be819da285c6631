//! Crop-group aggregation artifacts and group-mean overlay charts
//!
//! Runs after the pool: reads back the per-parcel CSVs that materialized
//! (parcels that failed upstream are skipped, not fatal), averages each
//! crop group by calendar date, smooths both metrics, and writes one CSV
//! per crop label.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use parcel2ndvi_config::OutputConfig;
use parcel2ndvi_core::{fit_crop_trend, mean_by_date, NdviProfile, Parcel, TrendPoint};
use parcel2ndvi_render::{ChartJob, ProfileRenderer, RenderOutcome};
use tracing::{error, info, warn};

use crate::process::{profile_csv_path, read_profile_csv};

/// Write `<base>/crop_mean_ndvi/<crop>.csv` for every crop with enough
/// valid daily means, returning the fitted series per crop label.
pub(crate) fn write_crop_means(
    parcels: &[Parcel],
    output: &OutputConfig,
) -> Result<BTreeMap<String, Vec<TrendPoint>>> {
    let dest = output.crop_mean_dir();
    std::fs::create_dir_all(&dest)
        .with_context(|| format!("failed to create {}", dest.display()))?;
    let ndvi_dir = output.ndvi_dir();

    let mut by_crop: BTreeMap<&str, Vec<&Parcel>> = BTreeMap::new();
    for parcel in parcels {
        by_crop.entry(&parcel.crop).or_default().push(parcel);
    }

    let mut means = BTreeMap::new();
    for (crop, members) in by_crop {
        let mut samples = Vec::new();
        for parcel in members {
            let path = profile_csv_path(&ndvi_dir, &parcel.id);
            if !path.exists() {
                warn!(parcel = %parcel.id, crop, "no profile CSV, skipping parcel");
                continue;
            }
            match read_profile_csv(&path) {
                Ok(points) => samples.extend(NdviProfile { points }.numeric_points()),
                Err(err) => {
                    warn!(parcel = %parcel.id, crop, error = format!("{err:#}"), "unreadable profile CSV, skipping parcel");
                }
            }
        }

        let daily = mean_by_date(samples);
        match fit_crop_trend(&daily) {
            Ok(trend) => {
                let path = dest.join(format!("{crop}.csv"));
                let mut writer = csv::Writer::from_path(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                for row in &trend {
                    writer.serialize(row)?;
                }
                writer.flush()?;
                info!(crop, rows = trend.len(), path = %path.display(), "crop mean written");
                means.insert(crop.to_string(), trend);
            }
            Err(err) => {
                warn!(crop, error = %err, "crop mean skipped");
            }
        }
    }

    Ok(means)
}

/// Render each surviving parcel again with its crop's mean curve and
/// stdev band. Returns the number of overlay charts produced.
pub(crate) fn render_overlays<R: ProfileRenderer>(
    parcels: &[Parcel],
    means: &BTreeMap<String, Vec<TrendPoint>>,
    renderer: &R,
    output: &OutputConfig,
) -> Result<usize> {
    let ndvi_dir = output.ndvi_dir();
    let mut rendered = 0;

    for parcel in parcels {
        let Some(mean) = means.get(&parcel.crop) else {
            continue;
        };
        let path = profile_csv_path(&ndvi_dir, &parcel.id);
        if !path.exists() {
            continue;
        }
        let points = match read_profile_csv(&path) {
            Ok(points) => points,
            Err(err) => {
                warn!(parcel = %parcel.id, error = format!("{err:#}"), "unreadable profile CSV, overlay skipped");
                continue;
            }
        };

        let job = ChartJob {
            parcel_id: &parcel.id,
            crop: &parcel.crop,
            title: &output.plot_title,
            points: &points,
            group_mean: Some(mean),
        };
        match renderer.render(&job) {
            Ok(RenderOutcome::Produced(path)) => {
                rendered += 1;
                info!(parcel = %parcel.id, chart = %path.display(), "overlay chart rendered");
            }
            Ok(RenderOutcome::Skipped(reason)) => {
                info!(parcel = %parcel.id, %reason, "overlay chart skipped");
            }
            Err(err) => {
                error!(parcel = %parcel.id, error = format!("{err:#}"), "overlay chart failed");
            }
        }
    }

    Ok(rendered)
}
