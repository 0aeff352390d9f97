use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::oracle::{EmbeddingOracle, OracleError, OracleRequest, TextOracle};
use crate::retry::{retry_call, RetryError, RetryPolicy};
use crate::store::VectorIndex;

pub const CONTEXT_NAMESPACE: &str = "ContextLibrary";
pub const KNOWLEDGE_NAMESPACE: &str = "KnowledgeStore";

/// Namespace names inside the bound vector index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    /// Style blueprints
    pub context: String,
    /// Factual knowledge chunks
    pub knowledge: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            context: CONTEXT_NAMESPACE.to_string(),
            knowledge: KNOWLEDGE_NAMESPACE.to_string(),
        }
    }
}

/// Everything a capability may reach during one run.
///
/// Built once by the engine after the store is bound and shared read-only
/// with every capability it resolves.
#[derive(Clone)]
pub struct RunBindings {
    pub text_oracle: Arc<dyn TextOracle>,
    pub embedding_oracle: Arc<dyn EmbeddingOracle>,
    pub index: Arc<dyn VectorIndex>,
    pub generation_model: String,
    pub embedding_model: String,
    pub namespaces: Namespaces,
    pub retry: RetryPolicy,
    pub cancellation: CancellationToken,
}

impl RunBindings {
    pub fn new(
        text_oracle: Arc<dyn TextOracle>,
        embedding_oracle: Arc<dyn EmbeddingOracle>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            text_oracle,
            embedding_oracle,
            index,
            generation_model: String::new(),
            embedding_model: String::new(),
            namespaces: Namespaces::default(),
            retry: RetryPolicy::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_models(
        mut self,
        generation_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        self.generation_model = generation_model.into();
        self.embedding_model = embedding_model.into();
        self
    }

    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Build a request against the run's generation model.
    pub fn request(&self, system: impl Into<String>, user: impl Into<String>) -> OracleRequest {
        OracleRequest::new(system, user, self.generation_model.clone())
    }

    /// Text completion through the retrying call layer.
    pub async fn complete(
        &self,
        operation: &str,
        request: OracleRequest,
    ) -> Result<String, RetryError<OracleError>> {
        retry_call(&self.retry, &self.cancellation, operation, || {
            let oracle = Arc::clone(&self.text_oracle);
            let request = request.clone();
            async move { oracle.complete(request).await }
        })
        .await
    }

    /// Embed one text through the retrying call layer.
    pub async fn embed(
        &self,
        operation: &str,
        text: &str,
    ) -> Result<Vec<f32>, RetryError<OracleError>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(operation, &texts).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            _ => Err(RetryError::Fatal {
                operation: operation.to_string(),
                attempt: 1,
                error: OracleError::Malformed(
                    "expected exactly one embedding vector".to_string(),
                ),
            }),
        }
    }

    /// Embed many texts through the retrying call layer.
    pub async fn embed_batch(
        &self,
        operation: &str,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, RetryError<OracleError>> {
        retry_call(&self.retry, &self.cancellation, operation, || {
            let oracle = Arc::clone(&self.embedding_oracle);
            let model = self.embedding_model.clone();
            async move { oracle.embed(texts, &model).await }
        })
        .await
    }
}

impl std::fmt::Debug for RunBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunBindings")
            .field("index", &self.index.name())
            .field("generation_model", &self.generation_model)
            .field("embedding_model", &self.embedding_model)
            .field("namespaces", &self.namespaces)
            .field("retry", &self.retry)
            .finish()
    }
}
