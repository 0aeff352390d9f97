use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{info, warn};

use cadence_config::{load_config, CadenceConfig};
use cadence_core::CancellationToken;
use cadence_stores::{load_blueprints, load_documents, IngestReport};

use crate::bootstrap;

#[derive(Debug, Parser)]
#[command(name = "cadence", about = "Cadence context engine CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan and execute one goal, printing the output and the trace as JSON
    Run(RunArgs),
    /// Embed blueprints and documents into the configured store
    Ingest(IngestArgs),
}

#[derive(Debug, Args, Clone)]
struct RunArgs {
    #[arg(long, default_value = "configs/cadence.yaml")]
    config: PathBuf,
    /// Print only the final output, without the trace
    #[arg(long)]
    output_only: bool,
    #[arg(value_name = "GOAL", required = true)]
    goal: Vec<String>,
}

#[derive(Debug, Args, Clone)]
struct IngestArgs {
    #[arg(long, default_value = "configs/cadence.yaml")]
    config: PathBuf,
    /// JSON list of blueprints (`id`, `description`, `blueprint`)
    #[arg(long)]
    blueprints: Option<PathBuf>,
    /// Directory of .txt / .md documents
    #[arg(long)]
    docs: Option<PathBuf>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Run(args) => run_goal(args).await,
            Command::Ingest(args) => ingest(args).await,
        }
    }
}

fn load(path: &Path) -> anyhow::Result<(CadenceConfig, PathBuf)> {
    let config = load_config(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    bootstrap::init_tracing(&config.observability);
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok((config, base_dir))
}

async fn run_goal(args: RunArgs) -> anyhow::Result<()> {
    let (config, base_dir) = load(&args.config)?;
    let goal = args.goal.join(" ");
    let runtime = bootstrap::build_runtime(&config, &base_dir).await?;

    let cancellation = CancellationToken::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let (output, trace) = runtime
        .engine
        .execute_with_cancellation(&goal, &runtime.run_config, cancellation)
        .await;

    let report = if args.output_only {
        output.unwrap_or(Value::Null)
    } else {
        json!({
            "output": output,
            "trace": serde_json::to_value(&trace).context("failed to serialize trace")?,
        })
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !trace.status().is_success() {
        anyhow::bail!(
            "run {} ended with status '{}': {}",
            trace.run_id(),
            trace.status(),
            trace.error().unwrap_or("no error recorded")
        );
    }
    Ok(())
}

async fn ingest(args: IngestArgs) -> anyhow::Result<()> {
    if args.blueprints.is_none() && args.docs.is_none() {
        anyhow::bail!("nothing to ingest: pass --blueprints and/or --docs");
    }
    let (config, base_dir) = load(&args.config)?;
    if config.store.backend == "in_memory" {
        warn!("store backend is in_memory: ingested vectors only live for this process");
    }

    let embedder = bootstrap::embedding_oracle(&config.providers)?;
    let connector =
        bootstrap::build_connector(&config, &base_dir, std::sync::Arc::clone(&embedder)).await?;
    let index = connector
        .connect(&bootstrap::store_binding(&config.store)?)
        .await
        .with_context(|| format!("failed to bind index '{}'", config.store.index_name))?;
    let ingestor = bootstrap::ingestor(&config, embedder);

    let mut report = IngestReport::default();
    if let Some(path) = &args.blueprints {
        let blueprints = load_blueprints(path)?;
        report.blueprints = ingestor.ingest_blueprints(index.as_ref(), &blueprints).await?;
    }
    if let Some(dir) = &args.docs {
        let documents = load_documents(dir)?;
        report.chunks = ingestor.ingest_documents(index.as_ref(), &documents).await?;
    }

    info!(
        index = %index.name(),
        blueprints = report.blueprints,
        chunks = report.chunks,
        "ingestion complete"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "index": index.name(),
            "blueprints": report.blueprints,
            "chunks": report.chunks,
        }))?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_requires_goal() {
        assert!(Cli::try_parse_from(["cadence", "run"]).is_err());
        let cli = Cli::try_parse_from(["cadence", "run", "Explain", "Juno"]).unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.goal.join(" "), "Explain Juno");
                assert_eq!(args.config, PathBuf::from("configs/cadence.yaml"));
                assert!(!args.output_only);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_arguments() {
        let cli = Cli::try_parse_from([
            "cadence",
            "ingest",
            "--config",
            "alt.yaml",
            "--blueprints",
            "data/blueprints.json",
            "--docs",
            "data/docs",
        ])
        .unwrap();
        match cli.command {
            Command::Ingest(args) => {
                assert_eq!(args.config, PathBuf::from("alt.yaml"));
                assert_eq!(args.blueprints, Some(PathBuf::from("data/blueprints.json")));
                assert_eq!(args.docs, Some(PathBuf::from("data/docs")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_without_inputs_is_rejected() {
        tokio_test::block_on(async {
            let err = ingest(IngestArgs {
                config: PathBuf::from("does-not-matter.yaml"),
                blueprints: None,
                docs: None,
            })
            .await
            .unwrap_err();
            assert!(err.to_string().contains("nothing to ingest"));
        });
    }
}
