//! Window materialization: one Parquet artifact per accepted target date.
//!
//! Layout: `{output_dir}/prices_window_{YYYY-MM-DD}.parquet`, plus
//! `{output_dir}/prices_window.parquet` as a byte copy of the latest
//! accepted window of the batch.
//!
//! Acceptance is strict: an artifact is written only if its matrix has
//! exactly `window_length` date rows. Anything shorter is skipped and
//! reported, never padded.

use super::pivot::pivot;
use super::select::{WindowSelection, WindowSelector};
use crate::data::provider::DataError;
use crate::data::warehouse::{tmp_path_for, write_parquet_atomic, PriceStore};
use crate::domain::PriceRow;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const WINDOW_FILE_PREFIX: &str = "prices_window_";
pub const WINDOW_FILE_EXT: &str = "parquet";
pub const LATEST_ALIAS_FILE: &str = "prices_window.parquet";

/// What happened for one target date.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    Written { path: PathBuf },
    SkippedInsufficientHistory { available: usize, required: usize },
}

/// Per-date outcomes of one materialization batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializeReport {
    /// Ascending by target date.
    pub outcomes: Vec<(NaiveDate, WindowOutcome)>,
    pub latest_alias: Option<PathBuf>,
}

impl MaterializeReport {
    /// Date-stamped artifacts in date order, then the alias.
    pub fn paths_written(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .outcomes
            .iter()
            .filter_map(|(_, o)| match o {
                WindowOutcome::Written { path } => Some(path.clone()),
                WindowOutcome::SkippedInsufficientHistory { .. } => None,
            })
            .collect();
        paths.extend(self.latest_alias.iter().cloned());
        paths
    }

    pub fn written_dates(&self) -> Vec<NaiveDate> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, WindowOutcome::Written { .. }))
            .map(|(d, _)| *d)
            .collect()
    }

    pub fn skipped_dates(&self) -> Vec<NaiveDate> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, WindowOutcome::SkippedInsufficientHistory { .. }))
            .map(|(d, _)| *d)
            .collect()
    }
}

/// Path of the date-stamped artifact for `date`.
pub fn window_path(output_dir: &Path, date: NaiveDate) -> PathBuf {
    output_dir.join(format!(
        "{WINDOW_FILE_PREFIX}{}.{WINDOW_FILE_EXT}",
        date.format("%Y-%m-%d")
    ))
}

/// Path of the fixed "latest" alias.
pub fn latest_alias_path(output_dir: &Path) -> PathBuf {
    output_dir.join(LATEST_ALIAS_FILE)
}

/// Materialize one window per target date from the long-form warehouse rows.
///
/// Target dates are processed in ascending order (duplicates collapse).
/// An empty `target_dates` is a no-op.
pub fn materialize(
    rows: &[PriceRow],
    window_length: usize,
    target_dates: &[NaiveDate],
    output_dir: &Path,
) -> Result<MaterializeReport, DataError> {
    let targets: BTreeSet<NaiveDate> = target_dates.iter().copied().collect();
    let mut report = MaterializeReport::default();
    if targets.is_empty() {
        return Ok(report);
    }

    let selector = WindowSelector::new(rows);
    let mut latest: Option<PathBuf> = None;

    for target in targets {
        let outcome = match selector.select(window_length, target) {
            WindowSelection::Insufficient {
                available,
                required,
            } => {
                tracing::info!(%target, available, required, "insufficient history; window skipped");
                WindowOutcome::SkippedInsufficientHistory {
                    available,
                    required,
                }
            }
            WindowSelection::Selected(window_rows) => {
                let matrix = pivot(window_rows);
                if matrix.n_rows() != window_length {
                    WindowOutcome::SkippedInsufficientHistory {
                        available: matrix.n_rows(),
                        required: window_length,
                    }
                } else {
                    fs::create_dir_all(output_dir)
                        .map_err(|e| DataError::Io(format!("failed to create dir: {e}")))?;
                    let path = window_path(output_dir, target);
                    let mut df = matrix.to_dataframe()?;
                    write_parquet_atomic(&mut df, &path)?;
                    tracing::debug!(
                        %target,
                        rows = matrix.n_rows(),
                        tickers = matrix.n_cols(),
                        missing_cells = matrix.missing_cells(),
                        path = %path.display(),
                        "wrote window"
                    );
                    latest = Some(path.clone());
                    WindowOutcome::Written { path }
                }
            }
        };
        report.outcomes.push((target, outcome));
    }

    if let Some(src) = latest {
        let alias = latest_alias_path(output_dir);
        copy_atomic(&src, &alias)?;
        report.latest_alias = Some(alias);
    }

    tracing::info!(
        written = report.written_dates().len(),
        skipped = report.skipped_dates().len(),
        "materialized windows"
    );
    Ok(report)
}

/// Materialize windows for every stored trading date in `[start, end]`.
pub fn materialize_range(
    store: &dyn PriceStore,
    window_length: usize,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    output_dir: &Path,
) -> Result<MaterializeReport, DataError> {
    let rows = store.load()?;
    let targets: Vec<NaiveDate> = WindowSelector::new(&rows)
        .trading_dates()
        .iter()
        .copied()
        .filter(|d| start.map_or(true, |s| *d >= s) && end.map_or(true, |e| *d <= e))
        .collect();
    materialize(&rows, window_length, &targets, output_dir)
}

fn copy_atomic(src: &Path, dst: &Path) -> Result<(), DataError> {
    let tmp = tmp_path_for(dst);
    fs::copy(src, &tmp).map_err(|e| DataError::Io(format!("copy {}: {e}", src.display())))?;
    fs::rename(&tmp, dst).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DataError::Io(format!("atomic rename failed: {e}"))
    })
}

// ── Artifact discovery ──────────────────────────────────────────────

/// A date-stamped window artifact found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowArtifact {
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// Parse `prices_window_YYYY-MM-DD.parquet` into its date.
pub fn parse_window_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name
        .strip_prefix(WINDOW_FILE_PREFIX)?
        .strip_suffix(WINDOW_FILE_EXT)?
        .strip_suffix('.')?;
    if stem.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// All date-stamped window artifacts in `dir`, ascending by date.
///
/// The alias and unrelated files are ignored. A missing directory yields an
/// empty list.
pub fn list_window_artifacts(dir: &Path) -> Result<Vec<WindowArtifact>, DataError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| DataError::Io(format!("read dir: {e}")))?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DataError::Io(format!("dir entry: {e}")))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(date) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_window_file_name)
        else {
            continue;
        };
        items.push(WindowArtifact { date, path });
    }
    items.sort_by_key(|a| a.date);
    Ok(items)
}

/// Keep artifacts with `start <= date <= end`; open bounds are unbounded.
pub fn filter_by_range(
    items: Vec<WindowArtifact>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<WindowArtifact> {
    items
        .into_iter()
        .filter(|a| start.map_or(true, |s| a.date >= s) && end.map_or(true, |e| a.date <= e))
        .collect()
}
