//! Oracle provider configuration types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Oracle providers and the models a run uses.
///
/// `generation_backend` serves the planner and every text-generating
/// capability; `embedding_backend` serves retrieval and ingestion. Either
/// falls back to the first declared backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub backends: Vec<BackendSpec>,
    #[serde(default)]
    pub generation_backend: Option<String>,
    #[serde(default)]
    pub embedding_backend: Option<String>,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            generation_backend: None,
            embedding_backend: None,
            generation_model: default_generation_model(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl ProvidersConfig {
    pub fn get_backend(&self, name: &str) -> Option<&BackendSpec> {
        self.backends.iter().find(|b| b.name == name)
    }

    pub fn generation(&self) -> Option<&BackendSpec> {
        self.select(self.generation_backend.as_deref())
    }

    pub fn embedding(&self) -> Option<&BackendSpec> {
        self.select(self.embedding_backend.as_deref())
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name.as_str()).collect()
    }

    fn select(&self, name: Option<&str>) -> Option<&BackendSpec> {
        match name {
            Some(name) => self.get_backend(name),
            None => self.backends.first(),
        }
    }
}

/// Backend configuration (auth, endpoint, vendor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSpec {
    /// Backend identifier referenced by `generation_backend` / `embedding_backend`.
    pub name: String,
    /// `openai` (any OpenAI-compatible API) or `mock`.
    pub kind: String,
    /// Base URL, e.g. `https://api.openai.com/v1`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Environment variable name containing the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Backend-specific settings.
    #[serde(default)]
    pub config: Value,
}

impl BackendSpec {
    /// Resolve the API key from environment variable.
    pub fn resolve_api_key(&self) -> Result<String, ApiKeyError> {
        let env_name = self.api_key_env.as_ref().ok_or(ApiKeyError::NotConfigured)?;
        std::env::var(env_name).map_err(|_| ApiKeyError::EnvNotFound(env_name.clone()))
    }

    /// Read backend config value as typed object.
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Errors related to API key resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiKeyError {
    #[error("API key environment variable not configured")]
    NotConfigured,
    #[error("Environment variable '{0}' not found")]
    EnvNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend(name: &str) -> BackendSpec {
        BackendSpec {
            name: name.to_string(),
            kind: "openai".to_string(),
            endpoint: None,
            api_key_env: Some("CADENCE_TEST_UNSET_KEY".to_string()),
            config: json!({"timeout_secs": 12}),
        }
    }

    #[test]
    fn test_backend_selection_falls_back_to_first() {
        let config = ProvidersConfig {
            backends: vec![backend("primary"), backend("embeddings")],
            embedding_backend: Some("embeddings".to_string()),
            ..ProvidersConfig::default()
        };
        assert_eq!(config.generation().map(|b| b.name.as_str()), Some("primary"));
        assert_eq!(config.embedding().map(|b| b.name.as_str()), Some("embeddings"));
    }

    #[test]
    fn test_backend_config_values() {
        let spec = backend("primary");
        assert_eq!(spec.get_config::<u64>("timeout_secs"), Some(12));
        assert_eq!(spec.get_config::<u64>("missing"), None);
    }

    #[test]
    fn test_missing_env_var_is_reported() {
        let spec = backend("primary");
        assert_eq!(
            spec.resolve_api_key(),
            Err(ApiKeyError::EnvNotFound("CADENCE_TEST_UNSET_KEY".to_string()))
        );
    }
}
