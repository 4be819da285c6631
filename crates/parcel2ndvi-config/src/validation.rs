// Configuration validation
//
// Validates that required fields are present and values are sensible

use anyhow::{bail, Result};
use chrono::NaiveDate;
use tracing::warn;

use crate::*;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_api_config(&config.api)?;
    validate_pool_config(&config.pool)?;
    validate_input_config(&config.input)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<()> {
    if config.client_id.is_empty() || config.client_secret.is_empty() {
        bail!(
            "api.client_id and api.client_secret are required \
             (or set PARCEL2NDVI_CLIENT_ID / PARCEL2NDVI_CLIENT_SECRET)"
        );
    }

    if !(0.0..=1.0).contains(&config.max_cloud_cover) {
        bail!("api.max_cloud_cover must be a fraction in [0, 1]");
    }

    let from: NaiveDate = config
        .time_range
        .from
        .parse()
        .map_err(|_| anyhow::anyhow!("api.time_range.from is not an ISO date"))?;
    let to: NaiveDate = config
        .time_range
        .to
        .parse()
        .map_err(|_| anyhow::anyhow!("api.time_range.to is not an ISO date"))?;
    if from > to {
        bail!("api.time_range.from must not be after api.time_range.to");
    }

    let [resx, resy] = config.resolution;
    if resx <= 0.0 || resy <= 0.0 {
        bail!("api.resolution values must be positive");
    }

    Ok(())
}

fn validate_pool_config(config: &PoolConfig) -> Result<()> {
    if config.workers == 0 {
        bail!("pool.workers must be greater than 0");
    }

    if config.batch_size == 0 {
        bail!("pool.batch_size must be greater than 0");
    }

    // Warn about request sizes the remote API is likely to reject
    if config.batch_size > 1000 {
        warn!(
            batch_size = config.batch_size,
            "pool.batch_size is very large; the remote API may reject the batch"
        );
    }

    Ok(())
}

fn validate_input_config(config: &InputConfig) -> Result<()> {
    if config.parcels_path.as_os_str().is_empty() {
        bail!("input.parcels_path must not be empty");
    }

    if config.id_property.is_empty() {
        bail!("input.id_property must not be empty");
    }

    if config.crop_property.is_empty() {
        bail!("input.crop_property must not be empty");
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<()> {
    if config.base_dir.as_os_str().is_empty() {
        bail!("output.base_dir must not be empty");
    }

    Ok(())
}
