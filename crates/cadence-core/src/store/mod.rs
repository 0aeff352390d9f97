//! Vector store abstractions
//!
//! The data store is bound once per run by a [`StoreConnector`] and then
//! queried read-only by capabilities through [`VectorIndex`]. Writes only
//! happen during ingestion, outside of any run.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("index '{0}' not found")]
    IndexNotFound(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("store configuration error: {0}")]
    Config(String),

    #[error("internal store error: {0}")]
    Internal(String),
}

/// A stored vector with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            values,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A query hit, best first
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

impl VectorMatch {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Handle to one vector index, partitioned by namespace
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Top-`top_k` nearest records in `namespace`, highest score first.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, StoreError>;

    /// Insert or replace records; returns the number written.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>)
        -> Result<usize, StoreError>;
}

/// Connection parameters for binding a data-store handle
#[derive(Clone, Default)]
pub struct StoreBinding {
    pub index_name: String,
    /// Backend-specific endpoint (e.g. control-plane URL)
    pub connection_url: Option<String>,
    pub api_key: Option<String>,
}

impl StoreBinding {
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            connection_url: None,
            api_key: None,
        }
    }

    pub fn with_connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl fmt::Debug for StoreBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBinding")
            .field("index_name", &self.index_name)
            .field("connection_url", &self.connection_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Opens a data-store handle for one run
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, binding: &StoreBinding) -> Result<Arc<dyn VectorIndex>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binding_debug_redacts_api_key() {
        let binding = StoreBinding::new("idx").with_api_key("secret-key");
        let rendered = format!("{:?}", binding);
        assert!(rendered.contains("idx"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn test_match_metadata_str() {
        let hit = VectorMatch {
            id: "a".to_string(),
            score: 0.9,
            metadata: VectorRecord::new("a", vec![])
                .with_metadata("source", "juno.txt")
                .with_metadata("n", json!(3))
                .metadata,
        };
        assert_eq!(hit.metadata_str("source"), Some("juno.txt"));
        assert_eq!(hit.metadata_str("n"), None);
    }
}
