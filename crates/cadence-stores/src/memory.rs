//! In-memory vector index and connector.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use cadence_core::store::{
    StoreBinding, StoreConnector, StoreError, VectorIndex, VectorMatch, VectorRecord,
};

/// In-memory vector index, partitioned by namespace
///
/// Queries rank by cosine similarity. All records in one index share the
/// dimension of the first record written.
pub struct InMemoryVectorIndex {
    name: String,
    namespaces: RwLock<HashMap<String, Vec<VectorRecord>>>,
    dimension: RwLock<Option<usize>>,
}

impl InMemoryVectorIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespaces: RwLock::new(HashMap::new()),
            dimension: RwLock::new(None),
        }
    }

    /// Number of records stored in `namespace`.
    pub fn count(&self, namespace: &str) -> Result<usize, StoreError> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(namespaces.get(namespace).map(Vec::len).unwrap_or(0))
    }

    /// Check that every record of a batch has the index dimension.
    ///
    /// An unset dimension is fixed only once the whole batch agrees on one.
    fn check_dimension(&self, records: &[VectorRecord]) -> Result<(), StoreError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let mut dimension = self
            .dimension
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let expected = dimension.unwrap_or(first.values.len());
        if let Some(bad) = records.iter().find(|r| r.values.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: bad.values.len(),
            });
        }
        *dimension = Some(expected);
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, StoreError> {
        if let Some(expected) = *self
            .dimension
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?
        {
            if expected != vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        let namespaces = self
            .namespaces
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let Some(records) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<VectorMatch> = records
            .iter()
            .map(|record| VectorMatch {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.values),
                metadata: record.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(top_k);

        debug!(
            index = %self.name,
            namespace,
            top_k,
            hits = matches.len(),
            "in-memory query"
        );
        Ok(matches)
    }

    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> Result<usize, StoreError> {
        self.check_dimension(&records)?;

        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let stored = namespaces.entry(namespace.to_string()).or_default();
        let written = records.len();
        for record in records {
            match stored.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record,
                None => stored.push(record),
            }
        }
        Ok(written)
    }
}

/// Hands out pre-registered in-memory indexes by name
#[derive(Default)]
pub struct InMemoryConnector {
    indexes: HashMap<String, Arc<InMemoryVectorIndex>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: Arc<InMemoryVectorIndex>) -> Self {
        self.indexes.insert(index.name().to_string(), index);
        self
    }

    pub fn index(&self, name: &str) -> Option<Arc<InMemoryVectorIndex>> {
        self.indexes.get(name).cloned()
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    async fn connect(&self, binding: &StoreBinding) -> Result<Arc<dyn VectorIndex>, StoreError> {
        let index = self
            .indexes
            .get(&binding.index_name)
            .cloned()
            .ok_or_else(|| StoreError::IndexNotFound(binding.index_name.clone()))?;
        Ok(index)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
