//! Pinecone-compatible vector index over HTTP.
//!
//! Binding resolves the index host through the control plane
//! (`GET {controller}/indexes/{name}`); queries and upserts then go to the
//! data plane at that host.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use cadence_core::store::{
    StoreBinding, StoreConnector, StoreError, VectorIndex, VectorMatch, VectorRecord,
};

pub const DEFAULT_CONTROLLER_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
/// Upserts are split into requests of at most this many vectors.
pub const UPSERT_BATCH_SIZE: usize = 100;

fn headers(api_key: &str) -> Result<HeaderMap, StoreError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "api-key",
        HeaderValue::from_str(api_key).map_err(|e| StoreError::Config(e.to_string()))?,
    );
    headers.insert("x-pinecone-api-version", HeaderValue::from_static(API_VERSION));
    Ok(headers)
}

/// Prefix bare hosts with `https://`.
fn data_plane_url(host: &str, path: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}/{}", host, path)
    } else {
        format!("https://{}/{}", host, path)
    }
}

async fn read_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("HTTP {}: {}", status, body)
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    namespace: &'a str,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: Option<usize>,
}

/// Connector binding Pinecone indexes by name
pub struct PineconeConnector {
    client: reqwest::Client,
}

impl PineconeConnector {
    pub fn new(timeout_secs: u64) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StoreConnector for PineconeConnector {
    async fn connect(&self, binding: &StoreBinding) -> Result<Arc<dyn VectorIndex>, StoreError> {
        let api_key = binding
            .api_key
            .clone()
            .ok_or_else(|| StoreError::Config("pinecone requires an api key".to_string()))?;
        let controller = binding
            .connection_url
            .as_deref()
            .unwrap_or(DEFAULT_CONTROLLER_URL)
            .trim_end_matches('/');
        let url = format!("{}/indexes/{}", controller, binding.index_name);

        let response = self
            .client
            .get(&url)
            .headers(headers(&api_key)?)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(StoreError::IndexNotFound(binding.index_name.clone()))
            }
            status if !status.is_success() => {
                return Err(StoreError::Connection(read_error(response).await))
            }
            _ => {}
        }
        let description: IndexDescription = response
            .json()
            .await
            .map_err(|e| StoreError::Connection(format!("invalid index description: {}", e)))?;

        info!(
            index = %binding.index_name,
            host = %description.host,
            dimension = ?description.dimension,
            "pinecone index bound"
        );
        Ok(Arc::new(PineconeIndex {
            client: self.client.clone(),
            name: binding.index_name.clone(),
            host: description.host,
            api_key,
            dimension: description.dimension,
        }))
    }
}

/// Data-plane handle for one Pinecone index
pub struct PineconeIndex {
    client: reqwest::Client,
    name: String,
    host: String,
    api_key: String,
    dimension: Option<usize>,
}

impl PineconeIndex {
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, StoreError> {
        let response = self
            .client
            .post(data_plane_url(&self.host, path))
            .headers(headers(&self.api_key)?)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StoreError::Query(read_error(response).await));
        }
        response
            .json()
            .await
            .map_err(|e| StoreError::Query(format!("invalid response: {}", e)))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, StoreError> {
        if let Some(expected) = self.dimension {
            if expected != vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        let request = QueryRequest {
            vector,
            top_k,
            namespace,
            include_metadata: true,
        };
        let response: QueryResponse = self.post("query", &request).await?;
        debug!(
            index = %self.name,
            namespace,
            top_k,
            hits = response.matches.len(),
            "pinecone query"
        );
        Ok(response
            .matches
            .into_iter()
            .map(|hit| VectorMatch {
                id: hit.id,
                score: hit.score,
                metadata: hit.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> Result<usize, StoreError> {
        let mut written = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let request = UpsertRequest {
                vectors: batch,
                namespace,
            };
            let response: UpsertResponse = self.post("vectors/upsert", &request).await?;
            written += response.upserted_count.unwrap_or(batch.len());
        }
        debug!(index = %self.name, namespace, written, "pinecone upsert");
        Ok(written)
    }
}
