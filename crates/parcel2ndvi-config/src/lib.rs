// parcel2ndvi-config - Unified runtime configuration
//
// Supports configuration from multiple sources:
// 1. Environment variables (PARCEL2NDVI_* prefix, highest priority)
// 2. Config file path from PARCEL2NDVI_CONFIG env var
// 3. Default config file locations (./config.toml, ./.parcel2ndvi.toml)
// 4. Built-in defaults (lowest priority)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod sources;
mod validation;

pub use sources::EnvSource;

/// Main runtime configuration, passed by reference into every component
/// that needs it. There is no process-global configuration object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    pub input: InputConfig,

    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Remote Statistical API access and query parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth2 client-credentials pair; usually supplied via the
    /// PARCEL2NDVI_CLIENT_ID / PARCEL2NDVI_CLIENT_SECRET env vars.
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Maximum cloud-cover fraction in [0, 1].
    #[serde(default = "default_max_cloud_cover")]
    pub max_cloud_cover: f64,

    #[serde(default)]
    pub time_range: TimeRange,

    #[serde(default = "default_aggregation_interval")]
    pub aggregation_interval: String,

    /// Sampling resolution (resx, resy) in CRS units.
    #[serde(default = "default_resolution")]
    pub resolution: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            from: "2021-01-01".to_string(),
            to: "2021-11-30".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_url: default_token_url(),
            client_id: String::new(),
            client_secret: String::new(),
            collection: default_collection(),
            max_cloud_cover: default_max_cloud_cover(),
            time_range: TimeRange::default(),
            aggregation_interval: default_aggregation_interval(),
            resolution: default_resolution(),
        }
    }
}

fn default_base_url() -> String {
    "https://services.sentinel-hub.com".to_string()
}

fn default_token_url() -> String {
    "https://services.sentinel-hub.com/auth/realms/main/protocol/openid-connect/token".to_string()
}

fn default_collection() -> String {
    "sentinel-2-l2a".to_string()
}

fn default_max_cloud_cover() -> f64 {
    0.8
}

fn default_aggregation_interval() -> String {
    "P1D".to_string()
}

fn default_resolution() -> [f64; 2] {
    [100.0, 100.0]
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Fixed number of workers sharing the work queue.
    pub workers: usize,

    /// Number of parcels submitted per remote request batch.
    pub batch_size: usize,

    /// Pause between worker launches, so the remote API is not hit with
    /// every worker's connection setup at once.
    pub startup_stagger_secs: u64,

    /// When set, the join barrier gives up after this many seconds and
    /// the run fails instead of hanging on a crashed worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_timeout_secs: Option<u64>,
}

impl PoolConfig {
    pub fn startup_stagger(&self) -> Duration {
        Duration::from_secs(self.startup_stagger_secs)
    }

    pub fn join_timeout(&self) -> Option<Duration> {
        self.join_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            batch_size: 200,
            startup_stagger_secs: 60,
            join_timeout_secs: None,
        }
    }
}

/// Parcel collection input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// GeoJSON FeatureCollection of parcel polygons.
    pub parcels_path: PathBuf,

    /// Feature property holding the parcel identifier.
    #[serde(default = "default_id_property")]
    pub id_property: String,

    /// Feature property holding the crop label.
    #[serde(default = "default_crop_property")]
    pub crop_property: String,
}

fn default_id_property() -> String {
    "id".to_string()
}

fn default_crop_property() -> String {
    "PRODUCTE".to_string()
}

/// Artifact output layout, all rooted under `base_dir`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub base_dir: PathBuf,

    #[serde(default = "default_plot_title")]
    pub plot_title: String,

    /// Draw per-point error bars on parcel charts.
    #[serde(default = "default_true")]
    pub error_bars: bool,

    /// After crop means are computed, render each parcel again with its
    /// crop's mean curve and stdev band.
    #[serde(default = "default_true")]
    pub group_overlay: bool,
}

impl OutputConfig {
    /// Per-parcel CSV directory: `<base>/ndvi/<id>_ndvi.csv`.
    pub fn ndvi_dir(&self) -> PathBuf {
        self.base_dir.join("ndvi")
    }

    /// Per-parcel chart directory: `<base>/ndvi_graphs/<id>_NDVI.jpg`.
    pub fn graphs_dir(&self) -> PathBuf {
        self.base_dir.join("ndvi_graphs")
    }

    /// Overlay chart directory:
    /// `<base>/ndvi_graphs_with_mean/parcel_id_<id>_NDVI.jpg`.
    pub fn graphs_with_mean_dir(&self) -> PathBuf {
        self.base_dir.join("ndvi_graphs_with_mean")
    }

    /// Per-crop mean CSV directory: `<base>/crop_mean_ndvi/<crop>.csv`.
    pub fn crop_mean_dir(&self) -> PathBuf {
        self.base_dir.join("crop_mean_ndvi")
    }
}

fn default_plot_title() -> String {
    "NDVI".to_string()
}

fn default_true() -> bool {
    true
}

/// Log sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Append-only log file; stdout when unset.
    #[serde(default = "default_log_file", skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("ndvi_processes.log"))
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority.
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for the CLI
    /// `--config` flag), then apply environment overrides.
    pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path.as_ref())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sections_match_expectations() {
        let pool = PoolConfig::default();
        assert_eq!(pool.workers, 3);
        assert_eq!(pool.batch_size, 200);
        assert_eq!(pool.startup_stagger(), Duration::from_secs(60));
        assert!(pool.join_timeout().is_none());

        let api = ApiConfig::default();
        assert_eq!(api.collection, "sentinel-2-l2a");
        assert_eq!(api.aggregation_interval, "P1D");
        assert_eq!(api.max_cloud_cover, 0.8);
    }

    #[test]
    fn output_dirs_hang_off_base_dir() {
        let output = OutputConfig {
            base_dir: PathBuf::from("/data/run"),
            plot_title: default_plot_title(),
            error_bars: true,
            group_overlay: true,
        };
        assert_eq!(output.ndvi_dir(), PathBuf::from("/data/run/ndvi"));
        assert_eq!(
            output.crop_mean_dir(),
            PathBuf::from("/data/run/crop_mean_ndvi")
        );
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            [input]
            parcels_path = "dun2021.geojson"

            [output]
            base_dir = "./out"
            "#,
        )
        .unwrap();
        assert_eq!(config.pool.workers, 3);
        assert_eq!(config.input.id_property, "id");
        assert_eq!(config.input.crop_property, "PRODUCTE");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.output.group_overlay);
    }
}
