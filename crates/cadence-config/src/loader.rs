//! Configuration loading and validation.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::{CadenceConfig, ProvidersConfig, StoreConfig};

const STORE_BACKENDS: [&str; 2] = ["in_memory", "pinecone"];

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load full Cadence configuration from YAML file.
pub fn load_config(path: &Path) -> Result<CadenceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from YAML text.
pub fn parse_config(content: &str) -> Result<CadenceConfig, ConfigError> {
    let config: CadenceConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &CadenceConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    let retry = &config.engine.retry;
    if retry.max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "engine.retry.max_attempts must be > 0".to_string(),
        ));
    }
    if retry.min_wait_ms > retry.max_wait_ms {
        return Err(ConfigError::Invalid(format!(
            "engine.retry.min_wait_ms ({}) must not exceed max_wait_ms ({})",
            retry.min_wait_ms, retry.max_wait_ms
        )));
    }

    if !(0.0..=2.0).contains(&config.planner.temperature) {
        return Err(ConfigError::Invalid(format!(
            "planner.temperature must be within [0, 2], got {}",
            config.planner.temperature
        )));
    }

    if config.observability.log_level.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "observability.log_level must not be empty".to_string(),
        ));
    }

    validate_providers(&config.providers)?;
    validate_store(&config.store)?;

    Ok(())
}

fn validate_providers(config: &ProvidersConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for backend in &config.backends {
        if backend.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "providers.backends[].name must not be empty".to_string(),
            ));
        }
        if backend.kind.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "providers.backends[{}].kind must not be empty",
                backend.name
            )));
        }
        if !seen.insert(backend.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "providers.backends[{}] is declared twice",
                backend.name
            )));
        }
    }

    for (field, name) in [
        ("generation_backend", &config.generation_backend),
        ("embedding_backend", &config.embedding_backend),
    ] {
        if let Some(name) = name {
            if config.get_backend(name).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "providers.{} '{}' not found",
                    field, name
                )));
            }
        }
    }

    if config.generation_model.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "providers.generation_model must not be empty".to_string(),
        ));
    }
    if config.embedding_model.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "providers.embedding_model must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_store(config: &StoreConfig) -> Result<(), ConfigError> {
    if !STORE_BACKENDS.contains(&config.backend.as_str()) {
        return Err(ConfigError::Invalid(format!(
            "store.backend '{}' is not one of {:?}",
            config.backend, STORE_BACKENDS
        )));
    }
    if config.index_name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "store.index_name must not be empty".to_string(),
        ));
    }
    if config.backend == "pinecone" && config.api_key_env.is_none() {
        return Err(ConfigError::Invalid(
            "store.api_key_env is required for the pinecone backend".to_string(),
        ));
    }

    let namespaces = &config.namespaces;
    if namespaces.context.trim().is_empty() || namespaces.knowledge.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "store.namespaces entries must not be empty".to_string(),
        ));
    }
    if namespaces.context == namespaces.knowledge {
        return Err(ConfigError::Invalid(
            "store.namespaces.context and knowledge must differ".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
version: 1
app:
  name: cadence-demo
engine:
  strict_step_order: true
  retry:
    max_attempts: 4
    min_wait_ms: 500
planner:
  temperature: 0.1
providers:
  generation_backend: deepseek
  generation_model: deepseek-chat
  embedding_model: text-embedding-v2
  backends:
    - name: deepseek
      kind: openai
      endpoint: https://api.deepseek.com/v1
      api_key_env: DEEPSEEK_API_KEY
store:
  backend: pinecone
  index_name: genai-mas-mcp-ch3
  api_key_env: PINECONE_API_KEY
observability:
  log_level: debug
"#;

    #[test]
    fn test_validate_config_accepts_default() {
        let config = CadenceConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write");

        let config = load_config(file.path()).expect("load");
        assert_eq!(config.app.name, "cadence-demo");
        assert_eq!(config.app.environment, "development");
        assert!(config.engine.strict_step_order);
        assert_eq!(config.engine.retry.max_attempts, 4);
        assert_eq!(config.engine.retry.min_wait_ms, 500);
        assert_eq!(config.engine.retry.max_wait_ms, 60_000);
        assert_eq!(
            config.providers.generation().map(|b| b.name.as_str()),
            Some("deepseek")
        );
        assert_eq!(config.store.backend, "pinecone");
        assert_eq!(config.store.namespaces.context, "ContextLibrary");
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = parse_config(SAMPLE).expect("parse");
        let rendered = serde_yaml::to_string(&config).expect("render");
        let reparsed = parse_config(&rendered).expect("reparse");
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = load_config(&dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "engine:\n  retry:\n    max_attempts: 0\n",
            "engine:\n  retry:\n    min_wait_ms: 9000\n    max_wait_ms: 10\n",
            "planner:\n  temperature: 3.5\n",
            "providers:\n  generation_backend: nowhere\n",
            "store:\n  backend: redis\n",
            "store:\n  backend: pinecone\n",
            "store:\n  namespaces:\n    context: same\n    knowledge: same\n",
            "providers:\n  backends:\n    - {name: a, kind: openai}\n    - {name: a, kind: mock}\n",
        ];
        for case in cases {
            assert!(
                matches!(parse_config(case), Err(ConfigError::Invalid(_))),
                "expected rejection for:\n{}",
                case
            );
        }
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        assert!(matches!(
            parse_config("engine: [unclosed"),
            Err(ConfigError::Parse(_))
        ));
    }
}
