// Configuration source loading.
//
// Priority order:
// 1. Environment variables (PARCEL2NDVI_* prefix)
// 2. Config file path from PARCEL2NDVI_CONFIG
// 3. Default config files (./config.toml, ./.parcel2ndvi.toml)
// 4. Built-in defaults for the optional sections

use std::env;
use std::path::Path;

use anyhow::{Context, Result};

use crate::RuntimeConfig;

pub(crate) const ENV_PREFIX: &str = "PARCEL2NDVI_";

/// Environment lookup seam so override behavior is testable without
/// mutating the process environment.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{ENV_PREFIX}{key}")).ok()
    }
}

/// Load configuration from the default file locations plus environment
/// overrides. A config file is required (the input/output sections have
/// no sensible defaults).
pub(crate) fn load_config() -> Result<RuntimeConfig> {
    if let Ok(path) = env::var("PARCEL2NDVI_CONFIG") {
        return load_from_file_path(Path::new(&path));
    }

    for path in &["./config.toml", "./.parcel2ndvi.toml"] {
        if Path::new(path).exists() {
            return load_from_file_path(Path::new(path));
        }
    }

    anyhow::bail!(
        "no config file found; pass --config or create ./config.toml (see config.example.toml)"
    )
}

pub(crate) fn load_from_file_path(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config: RuntimeConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    apply_env_overrides(&mut config, &StdEnvSource);
    Ok(config)
}

/// Apply PARCEL2NDVI_* overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut RuntimeConfig, source: &impl EnvSource) {
    if let Some(client_id) = source.get("CLIENT_ID") {
        config.api.client_id = client_id;
    }
    if let Some(client_secret) = source.get("CLIENT_SECRET") {
        config.api.client_secret = client_secret;
    }
    if let Some(base_url) = source.get("BASE_URL") {
        config.api.base_url = base_url;
    }
    if let Some(token_url) = source.get("TOKEN_URL") {
        config.api.token_url = token_url;
    }
    if let Some(level) = source.get("LOG_LEVEL") {
        config.logging.level = level;
    }
}
