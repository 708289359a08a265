//! Pricewin CLI: daily ingest, planning, window backfill, and store inspection.
//!
//! Commands:
//! - `ingest`: run the daily pipeline against a CSV price export
//! - `plan`: print the calendar days the next ingest would fetch
//! - `materialize`: regenerate window artifacts from the warehouse
//! - `status`: summarize the warehouse, its sidecar, and the last run signal
//! - `windows`: list date-stamped window artifacts

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use pricewin_core::data::{plan, CsvPriceSource, PriceStore};
use pricewin_core::window::{filter_by_range, list_window_artifacts, MaterializeReport, WindowOutcome};
use pricewin_runner::{backfill_windows, open_store, run_daily_ingest, IngestConfig, RunResult, RunSignal};

#[derive(Parser)]
#[command(
    name = "pricewin",
    about = "Daily price warehouse and rolling-window materializer"
)]
struct Cli {
    /// Path to the ingest TOML config.
    #[arg(long, global = true, default_value = "pricewin.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch missing dates, merge into the warehouse, materialize windows.
    Ingest {
        /// Long-form CSV export (`date,ticker,close`) to read prices from.
        #[arg(long)]
        source: PathBuf,

        /// Logical market date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        run_date: Option<String>,
    },
    /// Print the calendar days the next ingest would request.
    Plan {
        /// Logical market date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        run_date: Option<String>,
    },
    /// Regenerate window artifacts for stored trading dates.
    Materialize {
        /// First target date, inclusive (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Last target date, inclusive (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,
    },
    /// Summarize warehouse contents and the last run signal.
    Status,
    /// List window artifacts on disk.
    Windows {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = IngestConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Ingest { source, run_date } => run_ingest(&config, &source, run_date.as_deref()),
        Commands::Plan { run_date } => run_plan(&config, run_date.as_deref()),
        Commands::Materialize { start, end } => {
            run_materialize(&config, start.as_deref(), end.as_deref())
        }
        Commands::Status => run_status(&config),
        Commands::Windows { start, end } => run_windows(&config, start.as_deref(), end.as_deref()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn parse_opt_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
    s.map(parse_date).transpose()
}

fn resolve_run_date(s: Option<&str>) -> Result<NaiveDate> {
    Ok(parse_opt_date(s)?.unwrap_or_else(|| chrono::Local::now().date_naive()))
}

fn check_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            bail!("--start {s} is after --end {e}");
        }
    }
    Ok(())
}

fn run_ingest(config: &IngestConfig, source_path: &Path, run_date: Option<&str>) -> Result<()> {
    let run_date = resolve_run_date(run_date)?;
    let source = CsvPriceSource::open(source_path)?;
    let mut store = open_store(config);

    tracing::info!(
        %run_date,
        timezone = %config.timezone,
        prefer_adjusted = config.prefer_adjusted,
        "starting ingest"
    );
    let result = run_daily_ingest(config, run_date, &source, &mut store)?;
    print_run_summary(&result);
    Ok(())
}

fn run_plan(config: &IngestConfig, run_date: Option<&str>) -> Result<()> {
    let run_date = resolve_run_date(run_date)?;
    let store = open_store(config);
    let last = store.last_stored_date()?;
    let days = plan(last, run_date, config.lookback_buffer_days)?;

    match last {
        Some(last) => println!("Last stored date: {last}"),
        None => println!("Warehouse is empty (cold start)"),
    }
    match (days.first(), days.last()) {
        (Some(first), Some(end)) => {
            println!("Planned: {first} .. {end} ({} calendar days)", days.len())
        }
        _ => println!("Nothing to fetch for {run_date}"),
    }
    Ok(())
}

fn run_materialize(config: &IngestConfig, start: Option<&str>, end: Option<&str>) -> Result<()> {
    let start = parse_opt_date(start)?;
    let end = parse_opt_date(end)?;
    check_range(start, end)?;

    let store = open_store(config);
    let report = backfill_windows(config, &store, start, end)?;
    print_materialize_report(&report);
    Ok(())
}

fn run_status(config: &IngestConfig) -> Result<()> {
    let store = open_store(config);
    if !store.table_path().exists() {
        println!("Warehouse does not exist: {}", store.table_path().display());
        return Ok(());
    }

    let status = store.status()?;
    println!("Warehouse: {}", store.table_path().display());
    println!("Rows:      {}", status.row_count);
    println!("Tickers:   {}", status.ticker_count);
    println!("Dates:     {}", status.date_count);
    if let (Some(start), Some(end)) = (status.start_date, status.end_date) {
        println!("Range:     {start} to {end}");
    }
    match store.get_meta() {
        Some(meta) => {
            println!("Hash:      {}", meta.data_hash);
            println!("Written:   {}", meta.written_at);
        }
        None => println!("Meta:      (missing)"),
    }
    if let Some(signal) = RunSignal::read_json(&config.qc_out_dir)? {
        println!();
        println!("{}", serde_json::to_string_pretty(&signal)?);
    }
    Ok(())
}

fn run_windows(config: &IngestConfig, start: Option<&str>, end: Option<&str>) -> Result<()> {
    let start = parse_opt_date(start)?;
    let end = parse_opt_date(end)?;
    check_range(start, end)?;

    let items = filter_by_range(list_window_artifacts(&config.compute_inputs_dir)?, start, end);
    if items.is_empty() {
        println!("No window artifacts in {}", config.compute_inputs_dir.display());
        return Ok(());
    }
    for item in &items {
        println!("{}  {}", item.date, item.path.display());
    }
    println!("{} artifact(s)", items.len());
    Ok(())
}

fn print_run_summary(result: &RunResult) {
    println!();
    println!("=== Ingest Run {} ===", result.run_date);
    println!("Status:        {}", if result.ok { "ok" } else { "degraded" });
    println!("Dates written: {}", result.dates_written.len());
    if let (Some(first), Some(last)) = (result.dates_written.first(), result.dates_written.last()) {
        println!("Range:         {first} to {last}");
    }
    print_materialize_report(&result.windows);
    if let Some(qc) = &result.qc {
        if !qc.missing_tickers.is_empty() {
            println!("WARNING: missing tickers: {}", qc.missing_tickers.join(", "));
        }
        for note in &qc.notes {
            println!("Note: {note}");
        }
    }
    println!();
}

fn print_materialize_report(report: &MaterializeReport) {
    let mut written = 0usize;
    let mut skipped = 0usize;
    for (_, outcome) in &report.outcomes {
        match outcome {
            WindowOutcome::Written { .. } => written += 1,
            WindowOutcome::SkippedInsufficientHistory { .. } => skipped += 1,
        }
    }
    println!("Windows:       {written} written, {skipped} skipped");
    if let Some(alias) = &report.latest_alias {
        println!("Latest alias:  {}", alias.display());
    }
}
