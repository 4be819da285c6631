//! Per-parcel NDVI profiles, the CSV-facing projection of [`StatRecord`]s

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stats::StatRecord;

/// Metric keys produced by the NDVI evalscript's single-band `ndvi` output.
pub const NDVI_MEAN_KEY: &str = "ndvi_B0_mean";
pub const NDVI_STDEV_KEY: &str = "ndvi_B0_stDev";

/// One `acq_date,ndvi_mean,ndvi_std` row.
///
/// Values are optional: parcels too small for the sampling grid come back
/// with null statistics for every interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub acq_date: NaiveDate,
    pub ndvi_mean: Option<f64>,
    pub ndvi_std: Option<f64>,
}

/// A parcel's NDVI time series.
#[derive(Debug, Clone, Default)]
pub struct NdviProfile {
    pub points: Vec<ProfilePoint>,
}

impl NdviProfile {
    pub fn from_records(records: &[StatRecord]) -> Self {
        let points = records
            .iter()
            .map(|record| ProfilePoint {
                acq_date: record.interval_from,
                ndvi_mean: record.metrics.get(NDVI_MEAN_KEY).copied(),
                ndvi_std: record.metrics.get(NDVI_STDEV_KEY).copied(),
            })
            .collect();
        Self { points }
    }

    /// Points carrying finite values for both metrics, in date order.
    pub fn numeric_points(&self) -> Vec<(NaiveDate, f64, f64)> {
        let mut points: Vec<_> = self
            .points
            .iter()
            .filter_map(|point| match (point.ndvi_mean, point.ndvi_std) {
                (Some(mean), Some(std)) if mean.is_finite() && std.is_finite() => {
                    Some((point.acq_date, mean, std))
                }
                _ => None,
            })
            .collect();
        points.sort_by_key(|(date, _, _)| *date);
        points
    }

    /// True when no point carries numeric values for both metrics.
    pub fn is_degenerate(&self) -> bool {
        self.numeric_points().is_empty()
    }
}
