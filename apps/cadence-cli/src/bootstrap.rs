//! Wiring from a loaded [`CadenceConfig`] to a ready engine.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use cadence_agents::default_directory;
use cadence_config::{
    BackendSpec, CadenceConfig, NamespacesConfig, ObservabilityConfig, ProvidersConfig,
    RetryConfig, StoreConfig,
};
use cadence_core::capability::Namespaces;
use cadence_core::executor::{Engine, EngineOptions, RunConfig};
use cadence_core::oracle::{EmbeddingOracle, TextOracle};
use cadence_core::retry::RetryPolicy;
use cadence_core::store::{StoreBinding, StoreConnector};
use cadence_llm::{build_embedding_oracle, build_text_oracle, LlmPlanner, LlmPlannerConfig};
use cadence_stores::{Corpus, InMemoryConnector, InMemoryVectorIndex, Ingestor, PineconeConnector};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

const STORE_TIMEOUT_SECS: u64 = 60;

/// Install the global subscriber once.
///
/// `RUST_LOG` wins over `observability.log_level`; `CADENCE_LOG_FILE` wins
/// over `observability.log_file`. Without a file, logs go to stderr so
/// stdout stays machine-readable.
pub fn init_tracing(observability: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let log_file_path = std::env::var("CADENCE_LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| observability.log_file.clone());
        let fallback_level = match observability.log_level.trim().to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" => "warn",
            "error" => "error",
            _ => "info",
        };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        match log_file_path.as_deref().and_then(open_log_file) {
            Some(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
            }
            None => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .try_init();
            }
        }

        info!(
            log_level = %observability.log_level,
            log_file = log_file_path.as_deref().unwrap_or("(stderr)"),
            "tracing initialized"
        );
    });
}

fn open_log_file(path: &str) -> Option<std::fs::File> {
    use std::fs::{create_dir_all, OpenOptions};

    let file_path = Path::new(path);
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = create_dir_all(parent) {
                eprintln!(
                    "failed to create log directory '{}': {}",
                    parent.display(),
                    err
                );
                return None;
            }
        }
    }
    match OpenOptions::new().create(true).append(true).open(file_path) {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("failed to open log file '{}': {}", file_path.display(), err);
            None
        }
    }
}

pub fn retry_policy(config: &RetryConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.max_attempts,
        Duration::from_millis(config.min_wait_ms),
        Duration::from_millis(config.max_wait_ms),
    )
}

pub fn namespaces(config: &NamespacesConfig) -> Namespaces {
    Namespaces {
        context: config.context.clone(),
        knowledge: config.knowledge.clone(),
    }
}

fn generation_backend(providers: &ProvidersConfig) -> anyhow::Result<&BackendSpec> {
    providers
        .generation()
        .context("providers.backends is empty: no generation backend configured")
}

fn embedding_backend(providers: &ProvidersConfig) -> anyhow::Result<&BackendSpec> {
    providers
        .embedding()
        .context("providers.backends is empty: no embedding backend configured")
}

pub fn text_oracle(providers: &ProvidersConfig) -> anyhow::Result<Arc<dyn TextOracle>> {
    let backend = generation_backend(providers)?;
    build_text_oracle(backend)
        .with_context(|| format!("failed to build text oracle '{}'", backend.name))
}

pub fn embedding_oracle(providers: &ProvidersConfig) -> anyhow::Result<Arc<dyn EmbeddingOracle>> {
    let backend = embedding_backend(providers)?;
    build_embedding_oracle(backend)
        .with_context(|| format!("failed to build embedding oracle '{}'", backend.name))
}

pub fn store_binding(store: &StoreConfig) -> anyhow::Result<StoreBinding> {
    let mut binding = StoreBinding::new(store.index_name.clone());
    if let Some(url) = &store.controller_url {
        binding = binding.with_connection_url(url.clone());
    }
    if let Some(api_key) = store
        .resolve_api_key()
        .context("failed to resolve store api key")?
    {
        binding = binding.with_api_key(api_key);
    }
    Ok(binding)
}

pub fn ingestor(config: &CadenceConfig, embedder: Arc<dyn EmbeddingOracle>) -> Ingestor {
    Ingestor::new(embedder, config.providers.embedding_model.clone())
        .with_namespaces(namespaces(&config.store.namespaces))
        .with_retry(retry_policy(&config.engine.retry))
}

/// Relative paths in the config are taken from the config file's directory.
pub fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

/// Build the store connector for `store.backend`.
///
/// The in-memory backend starts empty and is seeded from `store.seed_file`
/// when one is configured.
pub async fn build_connector(
    config: &CadenceConfig,
    base_dir: &Path,
    embedder: Arc<dyn EmbeddingOracle>,
) -> anyhow::Result<Arc<dyn StoreConnector>> {
    let store = &config.store;
    match store.backend.as_str() {
        "pinecone" => Ok(Arc::new(
            PineconeConnector::new(STORE_TIMEOUT_SECS)
                .context("failed to build pinecone client")?,
        )),
        _ => {
            let index = Arc::new(InMemoryVectorIndex::new(store.index_name.clone()));
            match &store.seed_file {
                Some(seed) => {
                    let path = resolve_path(base_dir, seed);
                    let corpus = Corpus::load(&path)?;
                    let report = ingestor(config, embedder)
                        .ingest_corpus(index.as_ref(), &corpus)
                        .await
                        .with_context(|| format!("failed to seed store from {}", path.display()))?;
                    info!(
                        index = %store.index_name,
                        blueprints = report.blueprints,
                        chunks = report.chunks,
                        "in-memory store seeded"
                    );
                }
                None => warn!(
                    index = %store.index_name,
                    "in-memory store has no seed_file, capabilities will retrieve nothing"
                ),
            }
            Ok(Arc::new(InMemoryConnector::new().with_index(index)))
        }
    }
}

/// An engine plus the run configuration it executes under
pub struct Runtime {
    pub engine: Engine,
    pub run_config: RunConfig,
}

pub async fn build_runtime(config: &CadenceConfig, base_dir: &Path) -> anyhow::Result<Runtime> {
    let text = text_oracle(&config.providers)?;
    let embedder = embedding_oracle(&config.providers)?;
    let connector = build_connector(config, base_dir, Arc::clone(&embedder)).await?;

    let mut planner_config = LlmPlannerConfig {
        temperature: config.planner.temperature,
        ..LlmPlannerConfig::default()
    };
    if let Some(prompt) = &config.planner.system_prompt {
        planner_config.system_prompt = prompt.clone();
    }

    let engine = Engine::new(
        Arc::new(LlmPlanner::new(planner_config)),
        Arc::new(default_directory()),
        connector,
    )
    .with_options(EngineOptions {
        strict_step_order: config.engine.strict_step_order,
    });

    let run_config = RunConfig::new(text, embedder, store_binding(&config.store)?)
        .with_models(
            config.providers.generation_model.clone(),
            config.providers.embedding_model.clone(),
        )
        .with_namespaces(namespaces(&config.store.namespaces))
        .with_retry(retry_policy(&config.engine.retry));

    info!(
        app = %config.app.name,
        store_backend = %config.store.backend,
        index = %config.store.index_name,
        generation_model = %config.providers.generation_model,
        capabilities = ?engine.directory().names(),
        "runtime ready"
    );
    Ok(Runtime { engine, run_config })
}
