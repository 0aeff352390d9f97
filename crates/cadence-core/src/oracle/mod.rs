//! Oracle abstractions
//!
//! Oracles are the external generative services the engine leans on: a
//! text oracle answering system/user prompt pairs and an embedding oracle
//! turning text into fixed-length vectors. Calls to either are expected to
//! go through [`crate::retry::retry_call`].

use async_trait::async_trait;
use thiserror::Error;

use crate::retry::Transient;

/// Text completion request
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
    /// Ask the oracle for a JSON-structured completion
    pub json_mode: bool,
}

impl OracleRequest {
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: model.into(),
            temperature: 0.2,
            json_mode: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Oracle errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("http error: {0}")]
    Http(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Transient for OracleError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            OracleError::Http(_) | OracleError::RateLimited(_) | OracleError::Malformed(_)
        )
    }
}

/// Text-generation oracle
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn complete(&self, request: OracleRequest) -> Result<String, OracleError>;
}

/// Embedding oracle
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Embed each text; the result has one vector per input, in order.
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>, OracleError>;
}
