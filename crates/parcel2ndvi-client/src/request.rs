//! Statistics request bodies
//!
//! One request is built per geometry; the evalscript, time range,
//! aggregation interval, resolution, and cloud filter are shared across
//! a batch.

use parcel2ndvi_config::ApiConfig;
use serde::Serialize;
use serde_json::Value;

use crate::evalscript::NDVI_EVALSCRIPT;

/// The per-run query parameters shared by every request in a batch.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub evalscript: String,
    pub time_from: String,
    pub time_to: String,
    pub aggregation_interval: String,
    pub resx: f64,
    pub resy: f64,
    pub collection: String,
    /// Cloud-cover fraction in [0, 1].
    pub max_cloud_cover: f64,
}

impl QuerySpec {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            evalscript: NDVI_EVALSCRIPT.to_string(),
            time_from: format!("{}T00:00:00Z", config.time_range.from),
            time_to: format!("{}T23:59:59Z", config.time_range.to),
            aggregation_interval: config.aggregation_interval.clone(),
            resx: config.resolution[0],
            resy: config.resolution[1],
            collection: config.collection.clone(),
            max_cloud_cover: config.max_cloud_cover,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsRequest {
    pub input: Input,
    pub aggregation: Aggregation,
}

#[derive(Debug, Clone, Serialize)]
pub struct Input {
    pub bounds: Bounds,
    pub data: Vec<InputData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bounds {
    pub geometry: Value,
    pub properties: BoundsProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundsProperties {
    pub crs: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputData {
    #[serde(rename = "type")]
    pub collection: String,
    #[serde(rename = "dataFilter")]
    pub data_filter: DataFilter,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFilter {
    /// Percentage in [0, 100], as the API expects.
    pub max_cloud_coverage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub time_range: RequestTimeRange,
    pub aggregation_interval: AggregationInterval,
    pub evalscript: String,
    pub resx: f64,
    pub resy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestTimeRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregationInterval {
    pub of: String,
}

/// Build one statistics request for one geometry.
pub fn build_request(geometry: Value, crs: &str, query: &QuerySpec) -> StatisticsRequest {
    StatisticsRequest {
        input: Input {
            bounds: Bounds {
                geometry,
                properties: BoundsProperties {
                    crs: crs.to_string(),
                },
            },
            data: vec![InputData {
                collection: query.collection.clone(),
                data_filter: DataFilter {
                    max_cloud_coverage: query.max_cloud_cover * 100.0,
                },
            }],
        },
        aggregation: Aggregation {
            time_range: RequestTimeRange {
                from: query.time_from.clone(),
                to: query.time_to.clone(),
            },
            aggregation_interval: AggregationInterval {
                of: query.aggregation_interval.clone(),
            },
            evalscript: query.evalscript.clone(),
            resx: query.resx,
            resy: query.resy,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query() -> QuerySpec {
        QuerySpec {
            evalscript: "//VERSION=3".to_string(),
            time_from: "2021-01-01T00:00:00Z".to_string(),
            time_to: "2021-11-30T23:59:59Z".to_string(),
            aggregation_interval: "P1D".to_string(),
            resx: 100.0,
            resy: 100.0,
            collection: "sentinel-2-l2a".to_string(),
            max_cloud_cover: 0.8,
        }
    }

    #[test]
    fn serializes_to_documented_shape() {
        let geometry = json!({ "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] });
        let request = build_request(geometry.clone(), "EPSG:4326", &query());
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "input": {
                    "bounds": {
                        "geometry": geometry,
                        "properties": { "crs": "EPSG:4326" }
                    },
                    "data": [{
                        "type": "sentinel-2-l2a",
                        "dataFilter": { "maxCloudCoverage": 80.0 }
                    }]
                },
                "aggregation": {
                    "timeRange": {
                        "from": "2021-01-01T00:00:00Z",
                        "to": "2021-11-30T23:59:59Z"
                    },
                    "aggregationInterval": { "of": "P1D" },
                    "evalscript": "//VERSION=3",
                    "resx": 100.0,
                    "resy": 100.0
                }
            })
        );
    }

    #[test]
    fn query_spec_derives_from_api_config() {
        let config = parcel2ndvi_config::ApiConfig::default();
        let query = QuerySpec::from_config(&config);
        assert_eq!(query.time_from, "2021-01-01T00:00:00Z");
        assert_eq!(query.time_to, "2021-11-30T23:59:59Z");
        assert_eq!(query.max_cloud_cover, 0.8);
        assert!(query.evalscript.contains("ndvi"));
    }
}
