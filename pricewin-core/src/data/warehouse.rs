//! Price warehouse: the single merge-upsert store keyed by `(date, ticker)`.
//!
//! Layout: `{price_store_dir}/prices.parquet` plus a `prices.meta.json` sidecar.
//!
//! Every ingestion reads the whole table, merges the new rows over it
//! (last write wins per key), re-sorts by `(date, ticker)`, and swaps the
//! full table back in with a write-to-tmp + rename. A crash leaves either
//! the previous table or the new one, never a half-written file.

use super::provider::DataError;
use super::schema::{date_to_days, days_to_date, PriceSchema, CLOSE_COL, DATE_COL, TICKER_COL};
use crate::domain::PriceRow;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const WAREHOUSE_FILE: &str = "prices.parquet";
pub const META_FILE: &str = "prices.meta.json";

/// Storage seam for the warehouse.
///
/// Backends only provide whole-table `load` and `replace`; merge semantics
/// live in the provided methods so every backend shares them.
pub trait PriceStore {
    /// Read the full table, sorted by `(date, ticker)`. Empty if nothing stored yet.
    fn load(&self) -> Result<Vec<PriceRow>, DataError>;

    /// Atomically replace the full table.
    fn replace(&mut self, rows: &[PriceRow]) -> Result<(), DataError>;

    /// Merge `new_rows` into the store and return the distinct dates they cover.
    ///
    /// Colliding keys take the new value. An empty batch performs no write.
    fn merge_upsert(&mut self, new_rows: &[PriceRow]) -> Result<Vec<NaiveDate>, DataError> {
        if new_rows.is_empty() {
            return Ok(Vec::new());
        }

        let existing = self.load()?;
        let before = existing.len();
        let merged = merge_rows(existing, new_rows);
        self.replace(&merged)?;

        let dates = distinct_dates(new_rows);
        tracing::info!(
            new_rows = new_rows.len(),
            rows_before = before,
            rows_after = merged.len(),
            dates = dates.len(),
            "merged batch into warehouse"
        );
        Ok(dates)
    }

    /// Most recent stored date, or `None` for an empty/missing store.
    fn last_stored_date(&self) -> Result<Option<NaiveDate>, DataError> {
        Ok(self.load()?.iter().map(|r| r.date).max())
    }

    /// Row, ticker, and date counts computed from the table itself.
    fn status(&self) -> Result<WarehouseStatus, DataError> {
        Ok(WarehouseStatus::from_rows(&self.load()?))
    }
}

/// Union of `existing` and `new_rows`, unique on `(date, ticker)`, sorted.
///
/// `new_rows` win on collision; within `new_rows` the last occurrence wins.
pub fn merge_rows(existing: Vec<PriceRow>, new_rows: &[PriceRow]) -> Vec<PriceRow> {
    let mut table: BTreeMap<(NaiveDate, String), f64> = BTreeMap::new();
    for row in existing {
        table.insert((row.date, row.ticker), row.close);
    }
    for row in new_rows {
        table.insert((row.date, row.ticker.clone()), row.close);
    }
    table
        .into_iter()
        .map(|((date, ticker), close)| PriceRow { date, ticker, close })
        .collect()
}

/// Distinct dates present in `rows`, ascending.
pub fn distinct_dates(rows: &[PriceRow]) -> Vec<NaiveDate> {
    rows.iter()
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Summary of warehouse contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseStatus {
    pub row_count: usize,
    pub ticker_count: usize,
    pub date_count: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl WarehouseStatus {
    pub fn from_rows(rows: &[PriceRow]) -> Self {
        let tickers: BTreeSet<&str> = rows.iter().map(|r| r.ticker.as_str()).collect();
        let dates = distinct_dates(rows);
        Self {
            row_count: rows.len(),
            ticker_count: tickers.len(),
            date_count: dates.len(),
            start_date: dates.first().copied(),
            end_date: dates.last().copied(),
        }
    }
}

/// Metadata sidecar written after each successful table swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseMeta {
    pub row_count: usize,
    pub ticker_count: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub data_hash: String,
    pub written_at: chrono::NaiveDateTime,
}

// ── Parquet backend ─────────────────────────────────────────────────

/// File-backed warehouse.
pub struct ParquetWarehouse {
    dir: PathBuf,
}

impl ParquetWarehouse {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to the warehouse table.
    pub fn table_path(&self) -> PathBuf {
        self.dir.join(WAREHOUSE_FILE)
    }

    fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// Read the metadata sidecar, if present and parseable.
    pub fn get_meta(&self) -> Option<WarehouseMeta> {
        let content = fs::read_to_string(self.meta_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn write_meta(&self, rows: &[PriceRow]) -> Result<(), DataError> {
        let status = WarehouseStatus::from_rows(rows);
        let meta = WarehouseMeta {
            row_count: status.row_count,
            ticker_count: status.ticker_count,
            start_date: status.start_date,
            end_date: status.end_date,
            data_hash: blake3::hash(
                &serde_json::to_vec(rows)
                    .map_err(|e| DataError::Io(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Io(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(), json).map_err(|e| DataError::Io(format!("meta write: {e}")))
    }
}

impl PriceStore for ParquetWarehouse {
    fn load(&self) -> Result<Vec<PriceRow>, DataError> {
        let path = self.table_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let df = read_parquet(&path)?;
        PriceSchema::validate(&df).map_err(|e| DataError::Schema(e.to_string()))?;
        dataframe_to_rows(&df)
    }

    fn replace(&mut self, rows: &[PriceRow]) -> Result<(), DataError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| DataError::Io(format!("failed to create dir: {e}")))?;

        let mut df = rows_to_dataframe(rows)?;
        let path = self.table_path();
        write_parquet_atomic(&mut df, &path)?;

        if let Err(e) = self.write_meta(rows) {
            tracing::warn!(error = %e, "warehouse table written but metadata sidecar failed");
        }
        Ok(())
    }

    /// Reads only the `date` column.
    fn last_stored_date(&self) -> Result<Option<NaiveDate>, DataError> {
        let path = self.table_path();
        if !path.exists() {
            return Ok(None);
        }
        let df = LazyFrame::scan_parquet(&path, Default::default())
            .and_then(|lf| lf.select([col(DATE_COL).max()]).collect())
            .map_err(|e| DataError::Parquet(format!("scan max date: {e}")))?;
        let days = df
            .column(DATE_COL)
            .and_then(|c| c.date().map(|ca| ca.get(0)))
            .map_err(|e| DataError::Parquet(format!("date column type: {e}")))?;
        match days {
            None => Ok(None),
            Some(days) => days_to_date(days)
                .map(Some)
                .ok_or_else(|| DataError::Parquet(format!("date out of range: {days}"))),
        }
    }
}

// ── In-memory backend ───────────────────────────────────────────────

/// Warehouse held in memory; counts replacements so tests can assert on writes.
#[derive(Debug, Default, Clone)]
pub struct MemoryWarehouse {
    rows: Vec<PriceRow>,
    writes: usize,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with rows as if they had already been merged.
    pub fn with_rows(rows: Vec<PriceRow>) -> Self {
        Self {
            rows: merge_rows(Vec::new(), &rows),
            writes: 0,
        }
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl PriceStore for MemoryWarehouse {
    fn load(&self) -> Result<Vec<PriceRow>, DataError> {
        Ok(self.rows.clone())
    }

    fn replace(&mut self, rows: &[PriceRow]) -> Result<(), DataError> {
        self.rows = rows.to_vec();
        self.writes += 1;
        Ok(())
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// Convert warehouse rows to a Polars DataFrame.
fn rows_to_dataframe(rows: &[PriceRow]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = rows.iter().map(|r| date_to_days(r.date)).collect();
    let tickers: Vec<&str> = rows.iter().map(|r| r.ticker.as_str()).collect();
    let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();

    DataFrame::new(vec![
        Column::new(DATE_COL.into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::Parquet(format!("date cast: {e}")))?,
        Column::new(TICKER_COL.into(), tickers),
        Column::new(CLOSE_COL.into(), closes),
    ])
    .map_err(|e| DataError::Parquet(format!("dataframe creation: {e}")))
}

/// Convert a warehouse DataFrame back to rows.
fn dataframe_to_rows(df: &DataFrame) -> Result<Vec<PriceRow>, DataError> {
    let map_err = |e: PolarsError| DataError::Parquet(format!("column read: {e}"));

    let date_ca = df
        .column(DATE_COL)
        .map_err(map_err)?
        .date()
        .map_err(|e| DataError::Parquet(format!("date column type: {e}")))?;
    let ticker_ca = df
        .column(TICKER_COL)
        .map_err(map_err)?
        .str()
        .map_err(|e| DataError::Parquet(format!("ticker column type: {e}")))?;
    let close_ca = df
        .column(CLOSE_COL)
        .map_err(map_err)?
        .f64()
        .map_err(|e| DataError::Parquet(format!("close column type: {e}")))?;

    let n = df.height();
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::Parquet(format!("null date at row {i}")))?;
        let date = days_to_date(days)
            .ok_or_else(|| DataError::Parquet(format!("date out of range at row {i}")))?;
        let ticker = ticker_ca
            .get(i)
            .ok_or_else(|| DataError::Parquet(format!("null ticker at row {i}")))?;
        let close = close_ca.get(i).unwrap_or(f64::NAN);
        rows.push(PriceRow {
            date,
            ticker: ticker.to_string(),
            close,
        });
    }
    Ok(rows)
}

/// Read a Parquet file fully into memory.
pub(crate) fn read_parquet(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::Parquet(format!("open: {e}")))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Parquet(format!("read: {e}")))
}

/// Write a DataFrame to `path` via `{path}.tmp` + rename.
pub(crate) fn write_parquet_atomic(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let tmp_path = tmp_path_for(path);
    let file = fs::File::create(&tmp_path)
        .map_err(|e| DataError::Parquet(format!("create file: {e}")))?;
    if let Err(e) = ParquetWriter::new(file).finish(df) {
        let _ = fs::remove_file(&tmp_path);
        return Err(DataError::Parquet(format!("write parquet: {e}")));
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::Io(format!("atomic rename failed: {e}"))
    })
}

/// Sibling path with `.tmp` appended to the full file name.
pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
