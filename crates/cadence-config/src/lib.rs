//! # Cadence Config
//!
//! Single-file configuration for Cadence.
//! One `cadence.yaml` configures the engine, planner, oracle providers,
//! the vector store and observability settings.

mod loader;
mod providers;

pub use loader::{load_config, parse_config, ConfigError};
pub use providers::{ApiKeyError, BackendSpec, ProvidersConfig};

use serde::{Deserialize, Serialize};

/// Top-level configuration schema for Cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadenceConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            engine: EngineConfig::default(),
            planner: PlannerConfig::default(),
            providers: ProvidersConfig::default(),
            store: StoreConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_env(),
        }
    }
}

fn default_app_name() -> String {
    "cadence".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reject out-of-order plans before execution.
    #[serde(default)]
    pub strict_step_order: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry policy for oracle calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_min_wait_ms")]
    pub min_wait_ms: u64,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_wait_ms: default_min_wait_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    6
}

fn default_min_wait_ms() -> u64 {
    1_000
}

fn default_max_wait_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_planner_temperature")]
    pub temperature: f32,
    /// Optional system prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            temperature: default_planner_temperature(),
            system_prompt: None,
        }
    }
}

fn default_planner_temperature() -> f32 {
    0.2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `in_memory` or `pinecone`
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    /// Control-plane URL used to look up the index host.
    #[serde(default)]
    pub controller_url: Option<String>,
    /// Environment variable name containing the store API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// JSON file of records loaded into the in-memory store at startup.
    #[serde(default)]
    pub seed_file: Option<String>,
    #[serde(default)]
    pub namespaces: NamespacesConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            index_name: default_index_name(),
            controller_url: None,
            api_key_env: None,
            seed_file: None,
            namespaces: NamespacesConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Resolve the store API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<Option<String>, ApiKeyError> {
        match &self.api_key_env {
            Some(env_name) => std::env::var(env_name)
                .map(Some)
                .map_err(|_| ApiKeyError::EnvNotFound(env_name.clone())),
            None => Ok(None),
        }
    }
}

fn default_store_backend() -> String {
    "in_memory".to_string()
}

fn default_index_name() -> String {
    "cadence".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespacesConfig {
    #[serde(default = "default_context_namespace")]
    pub context: String,
    #[serde(default = "default_knowledge_namespace")]
    pub knowledge: String,
}

impl Default for NamespacesConfig {
    fn default() -> Self {
        Self {
            context: default_context_namespace(),
            knowledge: default_knowledge_namespace(),
        }
    }
}

fn default_context_namespace() -> String {
    "ContextLibrary".to_string()
}

fn default_knowledge_namespace() -> String {
    "KnowledgeStore".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
