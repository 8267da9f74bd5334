mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use catalog::ScopeTable;
use clap::{Parser, Subcommand};
use serde::Serialize;
use streaming::{BackendClient, ScopeController, SessionReport, SinkSnapshot};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Progressive loader for the geotagged flood-control project index")]
struct Args {
    /// Search endpoint URL (overrides LOADER_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Value of the `type` filter (overrides LOADER_DATASET_TYPE)
    #[arg(long)]
    dataset_type: Option<String>,

    /// Scope totals JSON (overrides LOADER_TOTALS_PATH; default: bundled table)
    #[arg(long)]
    totals: Option<PathBuf>,

    /// Delay between fetches in milliseconds (overrides LOADER_PACING_MS)
    #[arg(long)]
    pacing_ms: Option<u64>,

    /// Write the loaded records as a JSON array to this file
    #[arg(long)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initial view: a 10-record preview, then global pages
    Initial,

    /// Load a single region by name
    Region {
        /// Region name as listed by `regions`
        name: String,
    },

    /// Load every record, jumping ahead on large datasets
    All,

    /// Print the totals table
    Regions,
}

#[derive(Serialize)]
struct Summary<'a> {
    session: u64,
    scope: String,
    status: String,
    records: usize,
    positioned: usize,
    /// `[[min_lon, min_lat], [max_lon, max_lat]]`
    bounds: Option<[[f64; 2]; 2]>,
    fetches: usize,
    truncated: u64,
    stale_discarded: u32,
    mean_fetch_ms: Option<u64>,
    error: Option<String>,
    totals_fingerprint: &'a str,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(endpoint) = args.endpoint {
        config.endpoint = Some(endpoint);
    }
    if let Some(dataset_type) = args.dataset_type {
        config.dataset_type = dataset_type;
    }
    if let Some(path) = args.totals {
        config.totals_path = Some(path);
    }
    if let Some(ms) = args.pacing_ms {
        config.pacing = std::time::Duration::from_millis(ms);
    }

    let table = load_table(config.totals_path.as_deref()).await?;
    let fingerprint = table.fingerprint().to_string();
    info!(
        fingerprint = %fingerprint,
        regions = table.totals.regions().count(),
        "scope totals loaded"
    );

    if matches!(args.command, Command::Regions) {
        print_regions(&table);
        return Ok(());
    }

    let endpoint = config
        .endpoint
        .clone()
        .context("no search endpoint configured; set LOADER_ENDPOINT or pass --endpoint")?;
    let client = BackendClient::new(config.client_config(&endpoint), Arc::new(table.regions))
        .context("failed to build search client")?;
    info!(endpoint = %endpoint, dataset_type = %config.dataset_type, "search client ready");

    let mut controller = ScopeController::new(
        Arc::new(client),
        Arc::new(table.totals),
        config.controller_config(),
    );
    let progress = tokio::spawn(log_progress(controller.sink().subscribe()));

    let mut handle = match &args.command {
        Command::Initial => controller.load_initial().await,
        Command::Region { name } => controller.load_region(name).await,
        Command::All => controller.load_all().await,
        Command::Regions => return Ok(()),
    };

    tokio::select! {
        _ = handle.finished() => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                warn!(error = %err, "failed to listen for ctrl-c");
            }
            controller.cancel_active();
        }
    }

    let report = controller
        .join()
        .await
        .context("session task ended abnormally")?;
    let snapshot = controller.sink().snapshot();
    progress.abort();

    if let Some(path) = &args.output {
        write_records(path, &snapshot).await?;
        info!(path = %path.display(), records = snapshot.len(), "records written");
    }

    let summary = summarize(&report, &snapshot, &fingerprint);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn load_table(path: Option<&Path>) -> Result<ScopeTable> {
    let Some(path) = path else {
        return ScopeTable::builtin().context("bundled scope totals are invalid");
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    ScopeTable::from_json(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_regions(table: &ScopeTable) {
    let global = table.totals.total_for("global");
    println!("global\t{}\t{}", global.total_hits, global.total_pages);
    for (name, t) in table.totals.regions() {
        println!("{name}\t{}\t{}", t.total_hits, t.total_pages);
    }
}

async fn log_progress(mut rx: watch::Receiver<SinkSnapshot>) {
    while rx.changed().await.is_ok() {
        let snap = rx.borrow_and_update().clone();
        info!(
            session = ?snap.session.map(|s| s.get()),
            records = snap.len(),
            positioned = snap.positioned,
            "results updated"
        );
    }
}

async fn write_records(path: &Path, snapshot: &SinkSnapshot) -> Result<()> {
    let body = serde_json::to_vec_pretty(snapshot.records.as_slice())?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

fn summarize<'a>(report: &SessionReport, snapshot: &SinkSnapshot, fingerprint: &'a str) -> Summary<'a> {
    if let Some(err) = &report.error {
        warn!(kind = err.kind(), error = %err, "loading stopped early");
    }
    Summary {
        session: report.id.get(),
        scope: report.scope.to_string(),
        status: report.status.to_string(),
        records: report.records.len(),
        positioned: snapshot.positioned,
        bounds: snapshot.bounds.map(|b| [b.min, b.max]),
        fetches: report.metrics.fetches(),
        truncated: report.metrics.records_truncated,
        stale_discarded: report.metrics.stale_batches_discarded,
        mean_fetch_ms: report.metrics.fetch_latency_ms.mean(),
        error: report.error.as_ref().map(|e| e.to_string()),
        totals_fingerprint: fingerprint,
    }
}
