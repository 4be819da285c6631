// parcel2ndvi-client - Batch Request Client for the Statistical API
//
// Builds one statistics request per geometry and submits them together so
// transport-level delivery can be pipelined. Batching is an optimization:
// per-geometry behavior is identical regardless of batch size.

use async_trait::async_trait;
use futures_util::future;
use serde_json::Value;
use tracing::debug;

mod auth;
pub mod error;
pub mod evalscript;
pub mod request;

pub use error::RemoteRequestError;
pub use evalscript::NDVI_EVALSCRIPT;
pub use request::{build_request, QuerySpec, StatisticsRequest};

use parcel2ndvi_config::ApiConfig;

/// Seam for the remote Statistical API so the processing pipeline can run
/// against a test double.
#[async_trait]
pub trait StatsApi: Send + Sync {
    /// Submit one statistics request per geometry and return the raw
    /// responses in input order. Any sub-request failure (network, auth,
    /// quota) fails the whole batch.
    async fn submit(
        &self,
        geometries: &[Value],
        crs: &str,
        query: &QuerySpec,
    ) -> Result<Vec<Value>, RemoteRequestError>;
}

/// reqwest-backed client holding the endpoint and a bearer token obtained
/// at construction.
pub struct StatisticalApiClient {
    http: reqwest::Client,
    stats_url: String,
    access_token: String,
}

impl StatisticalApiClient {
    /// Build the HTTP client and perform the OAuth2 client-credentials
    /// exchange.
    pub async fn connect(config: &ApiConfig) -> Result<Self, RemoteRequestError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let access_token = auth::fetch_token(
            &http,
            &config.token_url,
            &config.client_id,
            &config.client_secret,
        )
        .await?;

        Ok(Self {
            http,
            stats_url: format!("{}/api/v1/statistics", config.base_url.trim_end_matches('/')),
            access_token,
        })
    }

    async fn post_statistics(&self, body: &StatisticsRequest) -> Result<Value, RemoteRequestError> {
        let response = self
            .http
            .post(&self.stats_url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteRequestError::Status {
                status: status.as_u16(),
                message: truncate(response.text().await.unwrap_or_default()),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl StatsApi for StatisticalApiClient {
    async fn submit(
        &self,
        geometries: &[Value],
        crs: &str,
        query: &QuerySpec,
    ) -> Result<Vec<Value>, RemoteRequestError> {
        let bodies: Vec<StatisticsRequest> = geometries
            .iter()
            .map(|geometry| build_request(geometry.clone(), crs, query))
            .collect();

        debug!(requests = bodies.len(), url = %self.stats_url, "submitting statistics batch");

        // join_all preserves input order, so responses line up with
        // geometries even though delivery is concurrent
        let responses = future::join_all(bodies.iter().map(|body| self.post_statistics(body))).await;
        responses.into_iter().collect()
    }
}

fn truncate(mut message: String) -> String {
    const LIMIT: usize = 512;
    if message.len() > LIMIT {
        message.truncate(LIMIT);
        message.push_str("...");
    }
    message
}
