//! Daily ingest: one sequential pass of
//! Universe → Planner → Fetch → Clean → Merge → Materialize → QC.
//!
//! Failure policy:
//! - Config, universe, source, and bad-value errors abort the run before
//!   the warehouse is touched.
//! - Errors after the merge still propagate, but the warehouse keeps the
//!   merged rows; a warning names the dates to re-materialize.
//! - Missing tickers on the latest fetched date only clear `ok`.
//! - Target dates without enough history are skipped, never errors.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use pricewin_core::data::{
    distinct_dates, fetch_batched, find_missing_tickers, Canonicalizer, CleanedBatch, DataError,
    FetchRange, ParquetWarehouse, PriceSource, PriceStore, Universe, UniverseError,
};
use pricewin_core::window::{materialize, materialize_range, MaterializeReport};

use crate::config::{ConfigError, IngestConfig};
use crate::qc::{QcReport, RunSignal};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("universe error: {0}")]
    Universe(#[from] UniverseError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one ingest run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// No missing tickers on the latest fetched date and no bad values.
    pub ok: bool,
    pub run_date: NaiveDate,
    pub dates_written: Vec<NaiveDate>,
    /// Present only when rows were written.
    pub qc: Option<QcReport>,
    pub windows: MaterializeReport,
}

impl RunResult {
    pub fn new_data(&self) -> bool {
        !self.dates_written.is_empty()
    }
}

/// File-backed store at `config.price_store_dir`.
pub fn open_store(config: &IngestConfig) -> ParquetWarehouse {
    ParquetWarehouse::new(&config.price_store_dir)
}

/// Load the universe named in the config.
pub fn load_universe(config: &IngestConfig) -> Result<Universe, RunError> {
    let universe = Universe::from_csv_path(&config.universe_path)?;
    tracing::debug!(path = %config.universe_path.display(), "universe path");
    Ok(universe)
}

/// Run the daily pipeline for `run_date` against `store`.
pub fn run_daily_ingest(
    config: &IngestConfig,
    run_date: NaiveDate,
    source: &dyn PriceSource,
    store: &mut dyn PriceStore,
) -> Result<RunResult, RunError> {
    config.validate()?;
    config.ensure_directories()?;
    let universe = load_universe(config)?;
    run_with_universe(config, &universe, run_date, source, store)
}

/// Pipeline body once the universe is in hand.
pub fn run_with_universe(
    config: &IngestConfig,
    universe: &Universe,
    run_date: NaiveDate,
    source: &dyn PriceSource,
    store: &mut dyn PriceStore,
) -> Result<RunResult, RunError> {
    let last_stored = store.last_stored_date()?;
    let range = FetchRange::plan(last_stored, run_date, config.lookback_buffer_days)?;
    tracing::info!(
        %run_date,
        last_stored = ?last_stored,
        start = %range.start,
        end_exclusive = %range.end_exclusive,
        "planned fetch"
    );

    let raw = if range.is_empty() {
        Vec::new()
    } else {
        let batches = universe.chunk(config.batch_size);
        fetch_batched(source, &batches, range.start, range.end_exclusive)?
    };

    // Rejected batches propagate here, before any write.
    let cleaned = Canonicalizer::clean(raw)?;
    let dates_written = store.merge_upsert(&cleaned.rows)?;

    let merged = (dates_written.first().copied(), dates_written.last().copied());
    finish_run(config, universe, run_date, &*store, &cleaned, dates_written).inspect_err(|e| {
        if let (Some(first), Some(last)) = merged {
            tracing::warn!(
                %run_date,
                %first,
                %last,
                error = %e,
                "merge landed but run failed; run `materialize` for the merged dates"
            );
        }
    })
}

/// Materialize, QC, and signal steps that follow a merge.
fn finish_run(
    config: &IngestConfig,
    universe: &Universe,
    run_date: NaiveDate,
    store: &dyn PriceStore,
    cleaned: &CleanedBatch,
    dates_written: Vec<NaiveDate>,
) -> Result<RunResult, RunError> {
    let windows = if dates_written.is_empty() {
        tracing::info!(%run_date, "no new trading-day rows; skipping materialization");
        MaterializeReport::default()
    } else {
        let rows = store.load()?;
        materialize(&rows, config.window_length, &dates_written, &config.compute_inputs_dir)?
    };

    let missing = match cleaned.latest_date() {
        Some(latest) => {
            let missing = find_missing_tickers(&cleaned.rows, universe.tickers(), latest);
            if !missing.is_empty() {
                tracing::warn!(
                    date = %latest,
                    count = missing.len(),
                    tickers = ?missing,
                    "tickers missing from latest date"
                );
            }
            missing
        }
        None => Vec::new(),
    };

    let qc = if dates_written.is_empty() {
        None
    } else {
        let notes = run_notes(&missing, cleaned.duplicate_count, &windows, cleaned.latest_date());
        let report = QcReport::build(
            run_date,
            distinct_dates(&cleaned.rows),
            universe,
            missing.clone(),
            cleaned.duplicate_count,
            0,
            notes,
        );
        report
            .write_json(&config.qc_out_dir)
            .map_err(|source| RunError::Output {
                path: QcReport::path_for(&config.qc_out_dir, run_date),
                source,
            })?;
        Some(report)
    };

    let signal = RunSignal {
        run_date,
        new_data: !dates_written.is_empty(),
    };
    signal
        .write_json(&config.qc_out_dir)
        .map_err(|source| RunError::Output {
            path: RunSignal::path_for(&config.qc_out_dir),
            source,
        })?;

    let ok = missing.is_empty();
    tracing::info!(
        %run_date,
        ok,
        dates_written = dates_written.len(),
        windows_written = windows.written_dates().len(),
        "ingest run complete"
    );

    Ok(RunResult {
        ok,
        run_date,
        dates_written,
        qc,
        windows,
    })
}

fn run_notes(
    missing: &[String],
    duplicates: usize,
    windows: &MaterializeReport,
    latest: Option<NaiveDate>,
) -> Vec<String> {
    let mut notes = Vec::new();
    if let (Some(latest), false) = (latest, missing.is_empty()) {
        notes.push(format!("{} ticker(s) missing on {latest}", missing.len()));
    }
    if duplicates > 0 {
        notes.push(format!("{duplicates} duplicate row(s) dropped"));
    }
    let skipped = windows.skipped_dates();
    if !skipped.is_empty() {
        notes.push(format!(
            "{} window(s) skipped for insufficient history",
            skipped.len()
        ));
    }
    notes
}

/// Regenerate window artifacts for every stored trading date in `[start, end]`.
pub fn backfill_windows(
    config: &IngestConfig,
    store: &dyn PriceStore,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<MaterializeReport, RunError> {
    config.validate()?;
    Ok(materialize_range(
        store,
        config.window_length,
        start,
        end,
        &config.compute_inputs_dir,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricewin_core::data::{MemoryWarehouse, RawPriceRow};
    use pricewin_core::domain::PriceRow;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct FixedSource(Vec<RawPriceRow>);

    impl PriceSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch(
            &self,
            tickers: &[String],
            start: NaiveDate,
            end_exclusive: NaiveDate,
        ) -> Result<Vec<RawPriceRow>, DataError> {
            Ok(self
                .0
                .iter()
                .filter(|r| tickers.contains(&r.ticker))
                .filter(|r| r.date() >= start && r.date() < end_exclusive)
                .cloned()
                .collect())
        }
    }

    fn setup() -> (tempfile::TempDir, IngestConfig, Universe) {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = IngestConfig::with_root(tmp.path());
        config.window_length = 2;
        config.batch_size = 1;
        let universe = Universe::new(vec!["AAPL".into(), "SPY".into()]).unwrap();
        (tmp, config, universe)
    }

    #[test]
    fn up_to_date_store_writes_signal_without_qc() {
        let (_tmp, config, universe) = setup();
        let mut store = MemoryWarehouse::with_rows(vec![PriceRow::new(d("2024-01-15"), "SPY", 1.0)]);
        let source = FixedSource(vec![]);

        let result =
            run_with_universe(&config, &universe, d("2024-01-15"), &source, &mut store).unwrap();

        assert!(!result.new_data());
        assert!(result.qc.is_none());
        assert!(result.windows.outcomes.is_empty());
        let signal = RunSignal::read_json(&config.qc_out_dir).unwrap().unwrap();
        assert!(!signal.new_data);
    }

    #[test]
    fn batches_are_fetched_per_ticker() {
        let (_tmp, config, universe) = setup();
        let mut store = MemoryWarehouse::new();
        let source = FixedSource(vec![
            RawPriceRow::on_date(d("2024-01-12"), "AAPL", 185.0),
            RawPriceRow::on_date(d("2024-01-12"), "SPY", 476.0),
        ]);

        let result =
            run_with_universe(&config, &universe, d("2024-01-15"), &source, &mut store).unwrap();

        assert!(result.ok);
        assert_eq!(result.dates_written, vec![d("2024-01-12")]);
        assert_eq!(store.rows().len(), 2);
    }

    #[test]
    fn failure_after_merge_keeps_merged_rows() {
        let (tmp, mut config, universe) = setup();
        let blocker = tmp.path().join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();
        config.qc_out_dir = blocker;
        let mut store = MemoryWarehouse::new();
        let source = FixedSource(vec![
            RawPriceRow::on_date(d("2024-01-12"), "AAPL", 185.0),
            RawPriceRow::on_date(d("2024-01-12"), "SPY", 476.0),
        ]);

        let err = run_with_universe(&config, &universe, d("2024-01-15"), &source, &mut store)
            .unwrap_err();

        assert!(matches!(err, RunError::Output { .. }));
        assert_eq!(store.rows().len(), 2);
        assert_eq!(store.last_stored_date().unwrap(), Some(d("2024-01-12")));
    }

    #[test]
    fn reserved_ticker_fails_before_any_write() {
        let (tmp, mut config, _) = setup();
        std::fs::write(tmp.path().join("universe.csv"), "ticker\nAAPL\ndate\n").unwrap();
        config.universe_path = tmp.path().join("universe.csv");
        let mut store = MemoryWarehouse::new();
        let source = FixedSource(vec![RawPriceRow::on_date(d("2024-01-12"), "AAPL", 185.0)]);

        let err = run_daily_ingest(&config, d("2024-01-15"), &source, &mut store).unwrap_err();

        assert!(matches!(
            err,
            RunError::Universe(UniverseError::ReservedTicker { .. })
        ));
        assert!(store.rows().is_empty());
    }

    #[test]
    fn notes_mention_skips_and_duplicates() {
        let mut windows = MaterializeReport::default();
        windows.outcomes.push((
            d("2024-01-12"),
            pricewin_core::window::WindowOutcome::SkippedInsufficientHistory {
                available: 1,
                required: 2,
            },
        ));
        let notes = run_notes(&["MSFT".into()], 3, &windows, Some(d("2024-01-12")));
        assert_eq!(notes.len(), 3);
        assert!(notes[0].contains("missing on 2024-01-12"));
    }
}
