//! Registry enrichment batch runner
//!
//! Loads a record snapshot, enriches up to one rate-limit window of candidates
//! from Companies House, and writes the snapshot back.
//!
//! Usage:
//!   cargo run --bin registry-enrich -- --records data/records.json
//!
//! Examples:
//!   # Look up the 20 most recently modified records without writing anything
//!   cargo run --bin registry-enrich -- --records data/records.json --limit 20 --dry-run
//!
//!   # Full run, print the report as JSON
//!   cargo run --bin registry-enrich -- --records data/records.json --json

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use registry_enrich::{
    CandidateSelector, CompaniesHouseClient, EnrichConfig, EnrichmentPipeline, EnvApiKey,
    MemoryStore,
};

/// Enrich business records with Companies House data
#[derive(Parser, Debug)]
#[command(name = "registry-enrich")]
#[command(about = "Enrich records with Companies House SIC codes and company status")]
struct Args {
    /// Record snapshot (JSON) to read and update in place
    #[arg(long, short = 'r', env = "ENRICH_RECORDS")]
    records: PathBuf,

    /// Look up and report, but do not load or save any record
    #[arg(long, short = 'n')]
    dry_run: bool,

    /// Maximum candidates this run (capped at 600)
    #[arg(long, short = 'l')]
    limit: Option<usize>,

    /// Candidates processed concurrently
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Enrichment run failed");
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when candidate selection failed
async fn run(args: Args) -> Result<bool> {
    let mut config = EnrichConfig::from_env()?;
    config.dry_run = args.dry_run;
    if let Some(limit) = args.limit {
        config.max_candidates = limit;
    }
    if let Some(n) = args.max_in_flight {
        config.max_in_flight = n;
    }
    let config = config.clamped();

    let store = MemoryStore::load_json(&args.records)
        .with_context(|| format!("Failed to load records from {}", args.records.display()))?;
    let client = CompaniesHouseClient::new(&config.registry, &EnvApiKey::default())?;

    let shared = Arc::new(store.clone());
    let selector = CandidateSelector::new(shared.clone()).with_limit(config.max_candidates);
    let pipeline = EnrichmentPipeline::from_config(&config, Arc::new(client), shared.clone(), shared);

    let report = pipeline.run_selected(&selector).await;
    report.log();

    if report.input_error.is_none() && !config.dry_run {
        store
            .write_json(&args.records)
            .with_context(|| format!("Failed to write records to {}", args.records.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(report.input_error.is_none())
}
