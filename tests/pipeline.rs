//! End-to-end pipeline runs over an in-process fake API: no network,
//! real artifacts on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use parcel2ndvi::run_with;
use parcel2ndvi_client::{QuerySpec, RemoteRequestError, StatsApi};
use parcel2ndvi_config::{
    ApiConfig, InputConfig, LogConfig, OutputConfig, PoolConfig, RuntimeConfig,
};
use parcel2ndvi_render::{
    ChartJob, PlottersRenderer, ProfileRenderer, RenderError, RenderOutcome, SkipReason,
};
use serde_json::{json, Value};

fn start_date() -> NaiveDate {
    "2021-03-01".parse().unwrap()
}

fn mean_for(marker: i64, week: u64) -> f64 {
    0.2 + 0.01 * marker as f64 + 0.05 * (week % 4) as f64
}

/// Deterministic Statistical API double. The parcel's index is smuggled
/// through its polygon's first coordinate.
struct FakeApi {
    fail_markers: HashSet<i64>,
    degenerate_markers: HashSet<i64>,
}

impl FakeApi {
    fn ok() -> Self {
        Self {
            fail_markers: HashSet::new(),
            degenerate_markers: HashSet::new(),
        }
    }

    fn marker(geometry: &Value) -> i64 {
        geometry["coordinates"][0][0][0].as_f64().unwrap() as i64
    }

    fn response_for(&self, marker: i64) -> Value {
        let mut data = Vec::new();
        for week in 0..8u64 {
            let date = start_date() + Days::new(7 * week);
            let stats = if self.degenerate_markers.contains(&marker) {
                json!({ "sampleCount": 40, "noDataCount": 40 })
            } else {
                json!({
                    "sampleCount": 100, "noDataCount": 5,
                    "min": 0.0, "max": 0.9,
                    "mean": mean_for(marker, week), "stDev": 0.05
                })
            };
            data.push(json!({
                "interval": {
                    "from": format!("{date}T00:00:00Z"),
                    "to": format!("{}T00:00:00Z", date + Days::new(1))
                },
                "outputs": { "ndvi": { "bands": { "B0": { "stats": stats } } } }
            }));
        }
        json!({ "data": data })
    }
}

#[async_trait]
impl StatsApi for FakeApi {
    async fn submit(
        &self,
        geometries: &[Value],
        _crs: &str,
        _query: &QuerySpec,
    ) -> Result<Vec<Value>, RemoteRequestError> {
        let markers: Vec<i64> = geometries.iter().map(Self::marker).collect();
        if markers.iter().any(|m| self.fail_markers.contains(m)) {
            return Err(RemoteRequestError::Status {
                status: 429,
                message: "quota exceeded".to_string(),
            });
        }
        Ok(markers
            .into_iter()
            .map(|marker| self.response_for(marker))
            .collect())
    }
}

/// File-dropping renderer double; can fail a chosen parcel to exercise
/// per-parcel isolation.
struct FakeRenderer {
    dir: PathBuf,
    fail_parcel: Option<String>,
}

impl ProfileRenderer for FakeRenderer {
    fn render(&self, job: &ChartJob<'_>) -> Result<RenderOutcome, RenderError> {
        if self.fail_parcel.as_deref() == Some(job.parcel_id) {
            return Err(RenderError::Backend("synthetic render failure".to_string()));
        }
        let has_numeric = job
            .points
            .iter()
            .any(|p| p.ndvi_mean.is_some() && p.ndvi_std.is_some());
        if !has_numeric {
            return Ok(RenderOutcome::Skipped(SkipReason::EmptySeries));
        }
        std::fs::create_dir_all(&self.dir)?;
        let name = match job.group_mean {
            Some(_) => format!("parcel_id_{}_NDVI.jpg", job.parcel_id),
            None => format!("{}_NDVI.jpg", job.parcel_id),
        };
        let path = self.dir.join(name);
        std::fs::write(&path, b"jpg")?;
        Ok(RenderOutcome::Produced(path))
    }
}

fn write_parcels(dir: &Path, count: usize) -> PathBuf {
    let features: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "type": "Feature",
                "properties": {
                    "id": i,
                    "PRODUCTE": if i % 2 == 0 { "ALFALS" } else { "BLAT" }
                },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[i, 0], [i + 1, 0], [i + 1, 1], [i, 0]]]
                }
            })
        })
        .collect();
    let path = dir.join("parcels.geojson");
    let collection = json!({ "type": "FeatureCollection", "features": features });
    std::fs::write(&path, serde_json::to_string(&collection).unwrap()).unwrap();
    path
}

fn config_for(dir: &Path, parcels_path: PathBuf, workers: usize, batch_size: usize) -> RuntimeConfig {
    RuntimeConfig {
        api: ApiConfig::default(),
        pool: PoolConfig {
            workers,
            batch_size,
            startup_stagger_secs: 0,
            join_timeout_secs: Some(30),
        },
        input: InputConfig {
            parcels_path,
            id_property: "id".to_string(),
            crop_property: "PRODUCTE".to_string(),
        },
        output: OutputConfig {
            base_dir: dir.join("out"),
            plot_title: "NDVI 2021".to_string(),
            error_bars: true,
            group_overlay: true,
        },
        logging: LogConfig::default(),
    }
}

#[tokio::test]
async fn pipeline_produces_all_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let parcels_path = write_parcels(tmp.path(), 6);
    let config = config_for(tmp.path(), parcels_path, 2, 2);
    let out = config.output.clone();

    let api = FakeApi {
        fail_markers: HashSet::new(),
        degenerate_markers: HashSet::from([5]),
    };
    let renderer = PlottersRenderer::new(out.graphs_dir(), out.graphs_with_mean_dir());

    let summary = run_with(config, api, renderer).await.unwrap();

    assert_eq!(summary.parcels, 6);
    let batches: HashSet<usize> = summary.batches_completed.iter().copied().collect();
    assert_eq!(batches, HashSet::from([1, 2, 3]));
    assert_eq!(summary.crops_written, 2);
    assert_eq!(summary.overlay_charts, 5);

    for i in 0..5 {
        assert!(
            out.ndvi_dir().join(format!("{i}_ndvi.csv")).exists(),
            "missing CSV for parcel {i}"
        );
        assert!(
            out.graphs_dir().join(format!("{i}_NDVI.jpg")).exists(),
            "missing chart for parcel {i}"
        );
    }

    // the degenerate parcel keeps its (empty) CSV but gets no chart
    assert!(out.ndvi_dir().join("5_ndvi.csv").exists());
    assert!(!out.graphs_dir().join("5_NDVI.jpg").exists());
    assert!(!out
        .graphs_with_mean_dir()
        .join("parcel_id_5_NDVI.jpg")
        .exists());

    let content = std::fs::read_to_string(out.ndvi_dir().join("0_ndvi.csv")).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("acq_date,ndvi_mean,ndvi_std"));
    assert!(lines.next().unwrap().starts_with("2021-03-01,0.2,"));
    assert_eq!(content.lines().count(), 9);

    assert!(out.crop_mean_dir().join("ALFALS.csv").exists());
    assert!(out.crop_mean_dir().join("BLAT.csv").exists());
    let mean = std::fs::read_to_string(out.crop_mean_dir().join("ALFALS.csv")).unwrap();
    assert!(mean.starts_with("acq_date,ndvi_mean,ndvi_stdev"));

    assert!(out
        .graphs_with_mean_dir()
        .join("parcel_id_0_NDVI.jpg")
        .exists());
}

#[tokio::test]
async fn failed_batch_produces_no_artifacts_but_is_acknowledged() {
    let tmp = tempfile::tempdir().unwrap();
    let parcels_path = write_parcels(tmp.path(), 6);
    let config = config_for(tmp.path(), parcels_path, 2, 2);
    let out = config.output.clone();

    // batch 2 covers parcels 2 and 3
    let api = FakeApi {
        fail_markers: HashSet::from([2]),
        degenerate_markers: HashSet::new(),
    };
    let renderer = FakeRenderer {
        dir: tmp.path().join("charts"),
        fail_parcel: None,
    };

    let summary = run_with(config, api, renderer).await.unwrap();

    // the failed batch is still dequeued and acknowledged
    let batches: HashSet<usize> = summary.batches_completed.iter().copied().collect();
    assert_eq!(batches, HashSet::from([1, 2, 3]));

    for i in [0usize, 1, 4, 5] {
        assert!(
            out.ndvi_dir().join(format!("{i}_ndvi.csv")).exists(),
            "sibling batch lost parcel {i}"
        );
        assert!(tmp.path().join(format!("charts/{i}_NDVI.jpg")).exists());
    }
    for i in [2usize, 3] {
        assert!(
            !out.ndvi_dir().join(format!("{i}_ndvi.csv")).exists(),
            "failed batch leaked a CSV for parcel {i}"
        );
        assert!(!tmp.path().join(format!("charts/{i}_NDVI.jpg")).exists());
    }
}

#[tokio::test]
async fn render_failure_is_isolated_to_one_parcel() {
    let tmp = tempfile::tempdir().unwrap();
    let parcels_path = write_parcels(tmp.path(), 3);
    let config = config_for(tmp.path(), parcels_path, 1, 3);
    let out = config.output.clone();

    let renderer = FakeRenderer {
        dir: tmp.path().join("charts"),
        fail_parcel: Some("1".to_string()),
    };

    let summary = run_with(config, FakeApi::ok(), renderer).await.unwrap();
    assert_eq!(summary.batches_completed, vec![1]);

    // parcels 0 and 2 produce both artifacts; parcel 1 produces neither
    for i in [0usize, 2] {
        assert!(out.ndvi_dir().join(format!("{i}_ndvi.csv")).exists());
        assert!(tmp.path().join(format!("charts/{i}_NDVI.jpg")).exists());
    }
    assert!(!out.ndvi_dir().join("1_ndvi.csv").exists());
    assert!(!tmp.path().join("charts/1_NDVI.jpg").exists());

    // parcel 1 was BLAT's only member, so only ALFALS gets a mean
    assert_eq!(summary.crops_written, 1);
    assert!(out.crop_mean_dir().join("ALFALS.csv").exists());
    assert!(!out.crop_mean_dir().join("BLAT.csv").exists());
}
