mod telemetry;
mod tools;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use embedding_service::EmbeddingGateway;
use log_store::{LogStore, StoreConfig};
use serde_json::Value;
use tracing::{info, warn};

use crate::tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "log-sync", version, about = "Sync access logs into Qdrant and query them")]
struct Cli {
    /// Defaults to `bootstrap`.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ensure the collection exists and, when enabled, ingest `LOG_FILE_PATH`.
    Bootstrap,
    /// Ingest one log file and print the summary as JSON.
    Ingest {
        /// Path to an access log.
        file: PathBuf,
    },
    /// List available tools.
    Tools,
    /// Run one tool with JSON arguments and print its JSON answer.
    Tool {
        name: String,
        /// JSON object, `{}` when omitted.
        args: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; a malformed one is not.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("loading .env");
        }
    }
    telemetry::init()?;

    let cli = Cli::parse();
    let registry = ToolRegistry::with_defaults();

    match cli.command.unwrap_or(Command::Bootstrap) {
        Command::Tools => {
            for (name, description) in registry.list() {
                println!("{name:<28} {description}");
            }
        }
        Command::Bootstrap => {
            let store = open_store()?;
            bootstrap(&store).await?;
        }
        Command::Ingest { file } => {
            let store = open_store()?;
            store.ensure_collection().await?;
            let summary = store
                .ingest_file(&file)
                .await
                .with_context(|| format!("ingesting {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Tool { name, args } => {
            let args: Value = match args.as_deref() {
                Some(raw) => serde_json::from_str(raw).context("tool arguments must be JSON")?,
                None => Value::Object(Default::default()),
            };
            let store = open_store()?;
            let out = registry.call(&name, &store, args).await?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn open_store() -> anyhow::Result<LogStore> {
    let gateway = EmbeddingGateway::from_env().context("embedding configuration")?;
    let cfg = StoreConfig::from_env().context("store configuration")?;
    Ok(LogStore::new(cfg, Arc::new(gateway))?)
}

/// Startup: collection first, then the optional initial load.
async fn bootstrap(store: &LogStore) -> anyhow::Result<()> {
    let created = store.ensure_collection().await?;
    info!(collection = store.collection(), created, "collection ready");

    let cfg = store.config();
    if !cfg.insert_log_messages {
        info!("QDRANT_INSERT_LOG_MESSAGES is off; skipping initial load");
        return Ok(());
    }

    let summary = store
        .ingest_file(&cfg.log_file_path)
        .await
        .with_context(|| format!("reading {}", cfg.log_file_path.display()))?;
    if summary.failed_chunks > 0 {
        warn!(failed = summary.failed_chunks, chunks = summary.chunks, "some chunks were not stored");
    }
    info!(
        received = summary.received,
        unparsed = summary.unparsed,
        already_stored = summary.already_stored,
        inserted = summary.inserted,
        "initial load done"
    );
    Ok(())
}
