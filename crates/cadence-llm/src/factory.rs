//! Oracle factory: builds oracles from backend configuration.

use std::sync::Arc;

use thiserror::Error;

use cadence_config::{ApiKeyError, BackendSpec};
use cadence_core::oracle::{EmbeddingOracle, OracleError, TextOracle};

use crate::mock::{HashingEmbeddingOracle, MockTextOracle};
use crate::openai::{OpenAiConfig, OpenAiEmbeddingOracle, OpenAiTextOracle, DEFAULT_ENDPOINT};

/// Errors that can occur when building an oracle.
#[derive(Debug, Error)]
pub enum OracleBuildError {
    #[error("unknown backend kind: {0}")]
    UnknownKind(String),
    #[error(transparent)]
    ApiKey(#[from] ApiKeyError),
    #[error("failed to build http client: {0}")]
    Client(#[from] OracleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    OpenAiCompatible,
    Mock,
}

fn parse_kind(kind: &str) -> Result<BackendKind, OracleBuildError> {
    match kind.to_lowercase().as_str() {
        "openai" | "openai_compatible" | "deepseek" | "dashscope" => {
            Ok(BackendKind::OpenAiCompatible)
        }
        "mock" => Ok(BackendKind::Mock),
        _ => Err(OracleBuildError::UnknownKind(kind.to_string())),
    }
}

fn openai_config(backend: &BackendSpec) -> Result<OpenAiConfig, OracleBuildError> {
    Ok(OpenAiConfig {
        endpoint: backend
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        api_key: Some(backend.resolve_api_key()?),
        timeout_secs: backend.get_config::<u64>("timeout_secs").unwrap_or(60),
        ..OpenAiConfig::default()
    })
}

/// Build the text oracle for a backend.
pub fn build_text_oracle(backend: &BackendSpec) -> Result<Arc<dyn TextOracle>, OracleBuildError> {
    match parse_kind(&backend.kind)? {
        BackendKind::OpenAiCompatible => {
            Ok(Arc::new(OpenAiTextOracle::new(openai_config(backend)?)?))
        }
        BackendKind::Mock => {
            let reply = backend
                .get_config::<String>("reply")
                .unwrap_or_else(|| "[]".to_string());
            Ok(Arc::new(MockTextOracle::new(reply)))
        }
    }
}

/// Build the embedding oracle for a backend.
pub fn build_embedding_oracle(
    backend: &BackendSpec,
) -> Result<Arc<dyn EmbeddingOracle>, OracleBuildError> {
    match parse_kind(&backend.kind)? {
        BackendKind::OpenAiCompatible => Ok(Arc::new(OpenAiEmbeddingOracle::new(
            openai_config(backend)?,
        )?)),
        BackendKind::Mock => {
            let dimension = backend.get_config::<usize>("dimension").unwrap_or(256);
            Ok(Arc::new(HashingEmbeddingOracle::new(dimension)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_backend(kind: &str, api_key_env: Option<&str>) -> BackendSpec {
        BackendSpec {
            name: "test".to_string(),
            kind: kind.to_string(),
            endpoint: None,
            api_key_env: api_key_env.map(str::to_string),
            config: json!({"dimension": 8}),
        }
    }

    #[test]
    fn test_unknown_kind() {
        let backend = make_backend("not-a-real-backend-kind", None);
        assert!(matches!(
            build_text_oracle(&backend),
            Err(OracleBuildError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_missing_env_var() {
        let backend = make_backend("openai", Some("CADENCE_FACTORY_TEST_UNSET_KEY"));
        assert!(matches!(
            build_text_oracle(&backend),
            Err(OracleBuildError::ApiKey(ApiKeyError::EnvNotFound(_)))
        ));
    }

    #[test]
    fn test_openai_requires_key_env() {
        let backend = make_backend("deepseek", None);
        assert!(matches!(
            build_embedding_oracle(&backend),
            Err(OracleBuildError::ApiKey(ApiKeyError::NotConfigured))
        ));
    }

    #[test]
    fn test_mock_backend_needs_no_key() {
        tokio_test::block_on(async {
            let backend = make_backend("mock", None);
            let embedder = build_embedding_oracle(&backend).unwrap();
            let vectors = embedder.embed(&["hello world".to_string()], "m").await.unwrap();
            assert_eq!(vectors[0].len(), 8);
            assert!(build_text_oracle(&backend).is_ok());
        });
    }
}
