// Logging/tracing initialization
//
// One fmt subscriber for the whole process; an append-only file sink
// when configured, stdout otherwise.

use std::sync::Arc;

use anyhow::{Context, Result};
use parcel2ndvi_config::{LogConfig, LogFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file: {}", path.display()))?;
            let writer = Arc::new(file);
            match config.format {
                LogFormat::Json => registry
                    .with(fmt::layer().json().with_ansi(false).with_writer(writer))
                    .init(),
                LogFormat::Text => registry
                    .with(fmt::layer().with_ansi(false).with_writer(writer))
                    .init(),
            }
        }
        None => match config.format {
            LogFormat::Json => registry.with(fmt::layer().json()).init(),
            LogFormat::Text => registry.with(fmt::layer()).init(),
        },
    }

    Ok(())
}
