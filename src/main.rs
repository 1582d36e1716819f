//! Harness - local code agent entry point
//!
//! With no subcommand an interactive session starts. `run` executes a single
//! task and exits with 0 (answer), 2 (step limit) or 1 (model unreachable).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use harness::agent::{build_system_prompt, AgentConfig, AgentController};
use harness::config::Config;
use harness::indexer::index_directory;
use harness::mcp::register_servers;
use harness::ollama::{ChatClient, Embedder, EmbeddingClient};
use harness::qdrant::QdrantClient;
use harness::shell::{run_interactive, run_once, Session};
use harness::tools::ToolRegistry;
use harness::tracing::{init_tracing, shutdown_tracing, OTLP_ENDPOINT_ENV};

#[derive(Parser)]
#[command(name = "harness", version, about = "Local code agent backed by Ollama")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single task and exit
    Run {
        #[arg(required = true, trailing_var_arg = true)]
        task: Vec<String>,
    },
    /// Index a directory for semantic search
    Index {
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Drop and recreate the collection first
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Keep the prompt readable; one-shot jobs log progress
    let default_filter = match cli.command {
        None => "warn",
        Some(_) => "warn,harness=info",
    };
    let otlp_endpoint = std::env::var(OTLP_ENDPOINT_ENV).ok();
    init_tracing("harness", default_filter, otlp_endpoint.as_deref())
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize tracing")?;

    let config = Config::load();
    info!(model = %config.chat_model, root = %config.filesystem_root.display(), "Loaded configuration");

    let embedder = Arc::new(
        EmbeddingClient::new(&config.ollama_host, &config.embed_model)
            .context("Failed to build embedding client")?,
    );
    let store = Arc::new(QdrantClient::new(&config.qdrant_url).context("Failed to build Qdrant client")?);

    let code = match cli.command {
        Some(Command::Index { dir, reset }) => {
            index(&dir, reset, &config, &embedder, &store).await?;
            0
        }
        command => {
            let backend = Arc::new(
                ChatClient::new(
                    &config.ollama_host,
                    &config.chat_model,
                    Duration::from_secs(config.request_timeout_secs),
                )
                .context("Failed to build chat client")?,
            );
            let mut registry = ToolRegistry::standard(
                config.filesystem_root.clone(),
                embedder.clone(),
                store.clone(),
                config.collection.clone(),
            );
            if !config.mcp_servers.is_empty() {
                let added = register_servers(&mut registry, &config.mcp_servers).await;
                info!(servers = config.mcp_servers.len(), tools = added, "Registered MCP tools");
            }
            let tools = Arc::new(registry);
            let system_prompt = build_system_prompt(&tools, &config.filesystem_root);
            let agent = AgentController::new(
                backend,
                tools,
                AgentConfig {
                    show_tool_calls: true,
                    ..AgentConfig::from(&config)
                },
            );
            let mut session = Session::new(agent, system_prompt, config, embedder, store);

            match command {
                Some(Command::Run { task }) => run_once(&mut session, &task.join(" ")).await,
                _ => {
                    run_interactive(session).await?;
                    0
                }
            }
        }
    };

    shutdown_tracing();
    // stdin may still hold a blocking reader
    std::process::exit(code);
}

async fn index(
    dir: &Path,
    reset: bool,
    config: &Config,
    embedder: &EmbeddingClient,
    store: &QdrantClient,
) -> anyhow::Result<()> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    if reset {
        let sample = embedder
            .embed("dimension sample")
            .await
            .context("Failed to reach the embedding model")?;
        store
            .reset_collection(&config.collection, sample.len())
            .await
            .context("Failed to reset collection")?;
    }

    println!("Indexing {}...", dir.display());
    let report = index_directory(dir, embedder, store, &config.collection)
        .await
        .with_context(|| format!("Failed to index {}", dir.display()))?;
    println!(
        "Done! Indexed {} chunks from {} files ({} failed).",
        report.chunks, report.files, report.failures
    );
    Ok(())
}
