//! Offline oracles for tests and local runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use cadence_core::oracle::{EmbeddingOracle, OracleError, OracleRequest, TextOracle};

/// Text oracle replaying scripted replies, then a fixed fallback
pub struct MockTextOracle {
    script: Mutex<VecDeque<Result<String, OracleError>>>,
    fallback: String,
    requests: Mutex<Vec<OracleRequest>>,
}

impl MockTextOracle {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue replies served before the fallback, in order.
    pub fn with_script(self, replies: Vec<Result<String, OracleError>>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(replies);
        }
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextOracle for MockTextOracle {
    async fn complete(&self, request: OracleRequest) -> Result<String, OracleError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let scripted = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        scripted.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Embedding oracle hashing words into a fixed number of buckets.
///
/// Texts sharing words land close together under cosine similarity, which
/// is enough for the in-memory store to behave sensibly offline.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingOracle {
    dimension: usize,
}

impl HashingEmbeddingOracle {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % self.dimension;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingEmbeddingOracle {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingOracle for HashingEmbeddingOracle {
    async fn embed(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>, OracleError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
