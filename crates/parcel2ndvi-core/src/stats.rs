//! Statistical API response parsing
//!
//! Converts one raw per-parcel response into flat [`StatRecord`] rows, one
//! per time interval. An interval where any band's sample count equals its
//! no-data count carries no signal (every sampled pixel was masked or
//! missing) and is dropped whole.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::error::ParseError;

/// Top-level Statistical API response for one parcel.
#[derive(Debug, Deserialize)]
pub struct StatisticalResponse {
    #[serde(default)]
    pub data: Vec<IntervalEntry>,
}

/// One time-bucketed aggregation window.
#[derive(Debug, Deserialize)]
pub struct IntervalEntry {
    pub interval: Interval,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputData>,
}

#[derive(Debug, Deserialize)]
pub struct Interval {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct OutputData {
    pub bands: BTreeMap<String, BandData>,
}

#[derive(Debug, Deserialize)]
pub struct BandData {
    pub stats: BandStats,
}

/// Per-band statistics for one interval.
///
/// `min`/`max`/`mean`/`stDev` are optional: the API reports nulls for
/// bands it could not sample.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandStats {
    pub sample_count: u64,
    pub no_data_count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub st_dev: Option<f64>,
    #[serde(default)]
    pub percentiles: BTreeMap<String, f64>,
}

/// One flattened row per (parcel, time interval).
///
/// Metric keys are `<output>_<band>_<stat>`, e.g. `ndvi_B0_mean`;
/// percentile statistics expand to one entry per percentile label.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRecord {
    pub interval_from: NaiveDate,
    pub interval_to: NaiveDate,
    pub metrics: BTreeMap<String, f64>,
}

/// Parse one raw Statistical API response into flat records.
///
/// Pure: the same input always yields the same rows. Zero valid intervals
/// is not an error. A shape mismatch fails here rather than as a missing
/// key deep in aggregation.
pub fn parse_statistics(raw: &serde_json::Value) -> Result<Vec<StatRecord>, ParseError> {
    let response: StatisticalResponse = serde_json::from_value(raw.clone())?;

    let mut records = Vec::with_capacity(response.data.len());
    'intervals: for entry in &response.data {
        for output in entry.outputs.values() {
            for band in output.bands.values() {
                if band.stats.sample_count == band.stats.no_data_count {
                    continue 'intervals;
                }
            }
        }

        let mut metrics = BTreeMap::new();
        for (output_name, output) in &entry.outputs {
            for (band_name, band) in &output.bands {
                let prefix = format!("{output_name}_{band_name}");
                let stats = &band.stats;
                metrics.insert(format!("{prefix}_sampleCount"), stats.sample_count as f64);
                metrics.insert(format!("{prefix}_noDataCount"), stats.no_data_count as f64);
                for (name, value) in [
                    ("min", stats.min),
                    ("max", stats.max),
                    ("mean", stats.mean),
                    ("stDev", stats.st_dev),
                ] {
                    if let Some(value) = value {
                        metrics.insert(format!("{prefix}_{name}"), value);
                    }
                }
                for (label, value) in &stats.percentiles {
                    metrics.insert(format!("{prefix}_percentiles_{label}"), *value);
                }
            }
        }

        records.push(StatRecord {
            interval_from: parse_interval_date(&entry.interval.from)?,
            interval_to: parse_interval_date(&entry.interval.to)?,
            metrics,
        });
    }

    Ok(records)
}

/// The API reports interval boundaries as RFC 3339 timestamps; bare ISO
/// dates are accepted as well.
fn parse_interval_date(value: &str) -> Result<NaiveDate, ParseError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.date_naive());
    }
    value.parse::<NaiveDate>().map_err(|_| ParseError::Timestamp {
        value: value.to_string(),
    })
}
