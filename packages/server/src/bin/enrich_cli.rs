//! CLI for operating the enrichment pipeline
//!
//! Runs batches, enriches single products, resets failures and prints
//! status counts. Every command prints one JSON document to stdout.

use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use server_core::config::Config;
use server_core::kernel::build_orchestrator;
use site_enrichment::{CancellationToken, EnrichmentMode, Orchestrator, RunOptions};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "enrich_cli")]
#[command(about = "Site enrichment operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one enrichment batch
    Run {
        /// Maximum records to process
        #[arg(long, default_value_t = 8)]
        limit: usize,
        /// metrics, screenshot or both
        #[arg(long, default_value = "both", value_parser = parse_mode)]
        mode: EnrichmentMode,
        /// Call providers but write nothing
        #[arg(long)]
        dry_run: bool,
        /// Include per-record errors in the output
        #[arg(long)]
        show_errors: bool,
    },

    /// Enrich a single product now
    One {
        product_id: Uuid,
        #[arg(long, default_value = "both", value_parser = parse_mode)]
        mode: EnrichmentMode,
    },

    /// Status counts across all records
    Stats,

    /// Move failed records back to pending (all of them if no ids given)
    ResetFailed { product_ids: Vec<Uuid> },
}

fn parse_mode(raw: &str) -> Result<EnrichmentMode, String> {
    EnrichmentMode::from_str(raw)
}

#[derive(Serialize)]
struct ResetResponse {
    success: bool,
    reset: u64,
}

fn output<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,site_enrichment=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let orchestrator = connect().await?;

    match cli.command {
        Commands::Run {
            limit,
            mode,
            dry_run,
            show_errors,
        } => cmd_run(&orchestrator, limit, mode, dry_run, show_errors).await,
        Commands::One { product_id, mode } => cmd_one(&orchestrator, product_id, mode).await,
        Commands::Stats => output(&orchestrator.stats().await?),
        Commands::ResetFailed { product_ids } => cmd_reset_failed(&orchestrator, product_ids).await,
    }
}

async fn connect() -> Result<Orchestrator> {
    let config = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    build_orchestrator(pool, &config)
}

async fn cmd_run(
    orchestrator: &Orchestrator,
    limit: usize,
    mode: EnrichmentMode,
    dry_run: bool,
    show_errors: bool,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing in-flight records...");
            on_interrupt.cancel();
        }
    });

    let report = orchestrator
        .run(RunOptions::new(limit, mode).dry_run(dry_run), cancel)
        .await?;

    if show_errors {
        output(&report)
    } else {
        output(&report.without_failures())
    }
}

async fn cmd_one(orchestrator: &Orchestrator, product_id: Uuid, mode: EnrichmentMode) -> Result<()> {
    let record = orchestrator
        .enrich_one(product_id, mode)
        .await
        .with_context(|| format!("Failed to enrich product {product_id}"))?;
    output(&record)
}

async fn cmd_reset_failed(orchestrator: &Orchestrator, product_ids: Vec<Uuid>) -> Result<()> {
    let ids = (!product_ids.is_empty()).then_some(product_ids.as_slice());
    let reset = orchestrator.reset_failed(ids).await?;
    output(&ResetResponse {
        success: true,
        reset,
    })
}
