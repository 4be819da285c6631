//! Crop-group aggregation: per-date means across parcels sharing a crop
//! label, smoothed with the fixed-degree trend fit

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::fit;

/// Arithmetic mean of `ndvi_mean` and `ndvi_std` for one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyMean {
    pub acq_date: NaiveDate,
    pub ndvi_mean: f64,
    pub ndvi_std: f64,
}

/// One smoothed crop-mean row (`acq_date,ndvi_mean,ndvi_stdev`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub acq_date: NaiveDate,
    pub ndvi_mean: f64,
    pub ndvi_stdev: f64,
}

/// Group samples by calendar date and average both metrics per date.
/// Output is in ascending date order.
pub fn mean_by_date(points: impl IntoIterator<Item = (NaiveDate, f64, f64)>) -> Vec<DailyMean> {
    let mut accumulator: BTreeMap<NaiveDate, (f64, f64, usize)> = BTreeMap::new();
    for (date, mean, std) in points {
        let slot = accumulator.entry(date).or_insert((0.0, 0.0, 0));
        slot.0 += mean;
        slot.1 += std;
        slot.2 += 1;
    }
    accumulator
        .into_iter()
        .map(|(acq_date, (mean_sum, std_sum, count))| DailyMean {
            acq_date,
            ndvi_mean: mean_sum / count as f64,
            ndvi_std: std_sum / count as f64,
        })
        .collect()
}

/// Fit the fixed-degree trend through both metrics of a daily-mean series.
pub fn fit_crop_trend(daily: &[DailyMean]) -> Result<Vec<TrendPoint>, FitError> {
    let dates: Vec<NaiveDate> = daily.iter().map(|d| d.acq_date).collect();
    let means: Vec<f64> = daily.iter().map(|d| d.ndvi_mean).collect();
    let stds: Vec<f64> = daily.iter().map(|d| d.ndvi_std).collect();

    let fitted_means = fit::fit_series(&dates, &means)?;
    let fitted_stds = fit::fit_series(&dates, &stds)?;

    Ok(dates
        .into_iter()
        .zip(fitted_means)
        .zip(fitted_stds)
        .map(|((acq_date, ndvi_mean), ndvi_stdev)| TrendPoint {
            acq_date,
            ndvi_mean,
            ndvi_stdev,
        })
        .collect())
}
