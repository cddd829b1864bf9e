//! # docrag CLI
//!
//! Command-line interface for docrag: ingest a directory of documents into a
//! vector index, then search it from the terminal or over HTTP.
//!
//! ## Commands
//!
//! - `docrag ingest [DIR]` - Extract, chunk, embed and store every document in DIR
//! - `docrag serve` - Run the HTTP search API
//! - `docrag query <TEXT>` - Search the index once
//! - `docrag status` - Show index statistics
//! - `docrag config show|init|path` - Inspect configuration
//!
//! ## Examples
//!
//! ```bash
//! # Index the sample documents with the local model
//! docrag ingest ./data/sample-documents
//!
//! # Serve on the default address (127.0.0.1:8000)
//! docrag serve
//!
//! # Search, JSON output
//! docrag --format json query "refund policy" --limit 3
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docrag::app::Components;
use docrag::config::Config;
use docrag::server;
use docrag_core::SearchHit;
use docrag_ingest::{FileStatus, IngestReport};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "Semantic search over PDF, markdown and text documents")]
#[command(version)]
struct Cli {
    /// Path to config file (default: platform config dir, config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every document directly inside a directory
    Ingest {
        /// Documents directory (default: documents.dir from the config)
        dir: Option<PathBuf>,
    },

    /// Run the HTTP search API until Ctrl+C
    Serve,

    /// Search the index once
    Query {
        /// Query text
        text: String,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show index status
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show default config file path
    Path,
}

/// Output structure for query results.
#[derive(Serialize)]
struct QueryOutput<'a> {
    query: &'a str,
    results: &'a [SearchHit],
}

/// Output structure for status.
#[derive(Serialize)]
struct StatusOutput {
    index: String,
    backend: String,
    metric: String,
    dimension: usize,
    model: String,
    records: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Sample and path need no valid configuration
    if let Commands::Config { action } = &cli.command {
        match action {
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
                return Ok(());
            }
            ConfigAction::Path => {
                match Config::config_path() {
                    Some(path) => println!("{}", path.display()),
                    None => println!("Could not determine config directory"),
                }
                return Ok(());
            }
            ConfigAction::Show => {}
        }
    }

    let config = Config::load_from(cli.config.clone()).context("Failed to load config")?;
    init_logging(cli.verbose, &config.logging.level)?;

    match cli.command {
        Commands::Ingest { dir } => {
            let dir = dir.unwrap_or_else(|| config.documents.dir.clone());
            if !dir.is_dir() {
                anyhow::bail!("Directory does not exist: {}", dir.display());
            }

            let components = Components::open(&config).await?;
            let report = components
                .ingest_driver(&config)
                .ingest_dir(&dir)
                .await
                .context("Ingestion aborted")?;

            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => print_report(&report),
            }
        }

        Commands::Serve => {
            let addr = config.server.bind_addr()?;
            let components = Components::open(&config).await?;
            let count = components.store.count().await?;
            info!(
                "Serving index '{}' ({} records)",
                components.store.spec().name,
                count
            );

            let service = Arc::new(components.query_service(&config));
            let shutdown = server::shutdown_on(tokio::signal::ctrl_c());
            server::serve(addr, service, shutdown).await?;
        }

        Commands::Query { text, limit } => {
            let components = Components::open(&config).await?;
            let hits = components
                .query_service(&config)
                .search(&text, limit)
                .await
                .context("Query execution failed")?;

            match cli.format {
                OutputFormat::Json => {
                    let output = QueryOutput {
                        query: &text,
                        results: &hits,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Query: {text}\n");
                    if hits.is_empty() {
                        println!("No results found.");
                    }
                    for (i, hit) in hits.iter().enumerate() {
                        println!(
                            "{}. {} #{} (distance: {:.4})",
                            i + 1,
                            hit.metadata.source,
                            hit.metadata.chunk,
                            hit.distance
                        );
                        println!("   {}", truncate(&hit.metadata.text, 100));
                        println!();
                    }
                }
            }
        }

        Commands::Status => {
            let components = Components::open(&config).await?;
            let stats = components.store.stats().await?;
            let output = StatusOutput {
                index: stats.spec.name,
                backend: stats.backend,
                metric: stats.spec.metric.to_string(),
                dimension: stats.spec.dimension,
                model: stats.spec.model,
                records: stats.total_records,
            };

            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Text => {
                    println!("Index '{}'", output.index);
                    println!("  Backend:   {}", output.backend);
                    println!("  Metric:    {}", output.metric);
                    println!("  Dimension: {}", output.dimension);
                    println!("  Model:     {}", output.model);
                    println!("  Records:   {}", output.records);
                }
            }
        }

        Commands::Config { .. } => match cli.format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&config).context("Failed to serialize config")?
            ),
            OutputFormat::Text => println!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to serialize config")?
            ),
        },
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `--verbose` and the config.
fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let default = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .with_context(|| format!("Invalid log level '{default}'"))?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn print_report(report: &IngestReport) {
    for file in &report.files {
        match &file.status {
            FileStatus::Stored {
                chunks,
                failed_batches,
            } if *failed_batches > 0 => println!(
                "  stored   {} ({chunks} chunks, {failed_batches} batches failed)",
                file.file_name
            ),
            FileStatus::Stored { chunks, .. } => {
                println!("  stored   {} ({chunks} chunks)", file.file_name);
            }
            FileStatus::Skipped { reason } => println!("  skipped  {} ({reason})", file.file_name),
            FileStatus::Failed { error } => println!("  failed   {} ({error})", file.file_name),
        }
    }
    println!(
        "\n{} processed, {} skipped, {} failed; {} chunks stored, {} batches failed",
        report.files_processed,
        report.files_skipped,
        report.files_failed,
        report.chunks_stored,
        report.batches_failed
    );
}

/// Truncate a string to max chars, adding ellipsis if needed.
fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace(['\n', '\r'], " ");
    if s.chars().count() <= max_chars {
        s
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
