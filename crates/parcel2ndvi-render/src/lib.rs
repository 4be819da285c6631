// parcel2ndvi-render - NDVI profile charts
//
// Thin presentation layer over plotters. The only decision callers care
// about is the tagged outcome: a chart was produced at a path, or the
// series was degenerate and deliberately skipped.

use std::path::PathBuf;
use std::time::Instant;

use tracing::debug;

mod backend;
mod chart;
pub mod error;

pub use error::{RenderError, SkipReason};

use parcel2ndvi_core::{NdviProfile, ProfilePoint, TrendPoint};

/// Everything needed to draw one parcel's chart.
pub struct ChartJob<'a> {
    pub parcel_id: &'a str,
    pub crop: &'a str,
    pub title: &'a str,
    pub points: &'a [ProfilePoint],
    /// When present, the chart is the overlay variant: crop-mean curve
    /// plus a ±1 stdev band, written under the with-mean graph dir.
    pub group_mean: Option<&'a [TrendPoint]>,
}

/// Tagged result so callers can log "skipped" distinctly from "failed".
#[derive(Debug)]
pub enum RenderOutcome {
    Produced(PathBuf),
    Skipped(SkipReason),
}

/// Seam for the chart renderer so the processing pipeline can run
/// against a test double.
pub trait ProfileRenderer: Send + Sync {
    fn render(&self, job: &ChartJob<'_>) -> Result<RenderOutcome, RenderError>;
}

/// plotters-backed renderer writing JPEG artifacts.
pub struct PlottersRenderer {
    graphs_dir: PathBuf,
    graphs_with_mean_dir: PathBuf,
    error_bars: bool,
    size: (u32, u32),
}

impl PlottersRenderer {
    pub fn new(graphs_dir: PathBuf, graphs_with_mean_dir: PathBuf) -> Self {
        Self {
            graphs_dir,
            graphs_with_mean_dir,
            error_bars: true,
            size: (1300, 700),
        }
    }

    pub fn with_error_bars(mut self, error_bars: bool) -> Self {
        self.error_bars = error_bars;
        self
    }
}

impl ProfileRenderer for PlottersRenderer {
    fn render(&self, job: &ChartJob<'_>) -> Result<RenderOutcome, RenderError> {
        let profile = NdviProfile {
            points: job.points.to_vec(),
        };
        let numeric = profile.numeric_points();
        let (Some(first), Some(last)) = (numeric.first(), numeric.last()) else {
            return Ok(RenderOutcome::Skipped(SkipReason::EmptySeries));
        };
        let (first, last) = (first.0, last.0);

        let (dir, file_name) = match job.group_mean {
            Some(_) => (
                &self.graphs_with_mean_dir,
                format!("parcel_id_{}_NDVI.jpg", job.parcel_id),
            ),
            None => (&self.graphs_dir, format!("{}_NDVI.jpg", job.parcel_id)),
        };
        std::fs::create_dir_all(dir)?;
        let path = dir.join(file_name);

        let start = Instant::now();
        chart::draw(&path, job, &numeric, first, last, self.error_bars, self.size)?;
        debug!(
            parcel = job.parcel_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "chart drawn"
        );

        Ok(RenderOutcome::Produced(path))
    }
}
