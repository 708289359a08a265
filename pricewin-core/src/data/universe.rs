//! Universe configuration: the fixed ticker list a run ingests.
//!
//! The universe is read from a CSV file with a `ticker` header column.
//! It is validated once on load and immutable for the rest of the run.
//! A ticker may not be named after the window matrix's date column.

use super::schema::DATE_COL;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Column holding ticker symbols in the universe CSV.
pub const TICKER_COLUMN: &str = "ticker";

#[derive(Debug, Error, PartialEq)]
pub enum UniverseError {
    #[error("universe is empty: no tickers found")]
    Empty,

    #[error("universe contains duplicate ticker '{ticker}'")]
    Duplicate { ticker: String },

    #[error("universe contains a blank ticker at row {index}")]
    Blank { index: usize },

    #[error("ticker '{ticker}' collides with the reserved date column")]
    ReservedTicker { ticker: String },

    #[error("universe file has no 'ticker' column")]
    MissingTickerColumn,

    #[error("read universe file: {0}")]
    Read(String),
}

/// The validated ticker universe for one run.
///
/// Only constructible through the validating constructors.
#[derive(Debug, Clone, Serialize)]
pub struct Universe {
    tickers: Vec<String>,
    as_of: NaiveDateTime,
}

impl Universe {
    /// Validate an in-memory ticker list, stamped with the current local time.
    pub fn new(tickers: Vec<String>) -> Result<Self, UniverseError> {
        Self::with_as_of(tickers, chrono::Local::now().naive_local())
    }

    /// Validate a ticker list with an explicit load timestamp.
    pub fn with_as_of(tickers: Vec<String>, as_of: NaiveDateTime) -> Result<Self, UniverseError> {
        validate_tickers(&tickers)?;
        Ok(Self { tickers, as_of })
    }

    /// Load a universe from a CSV file.
    pub fn from_csv_path(path: &Path) -> Result<Self, UniverseError> {
        let file = std::fs::File::open(path)
            .map_err(|e| UniverseError::Read(format!("{}: {e}", path.display())))?;
        Self::from_csv_reader(file)
    }

    /// Load a universe from any CSV reader.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, UniverseError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| UniverseError::Read(e.to_string()))?;
        let col = headers
            .iter()
            .position(|h| h == TICKER_COLUMN)
            .ok_or(UniverseError::MissingTickerColumn)?;

        let mut tickers = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| UniverseError::Read(e.to_string()))?;
            tickers.push(record.get(col).unwrap_or_default().to_string());
        }

        let universe = Self::new(tickers)?;
        tracing::info!(tickers = universe.len(), "loaded universe");
        Ok(universe)
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn as_of(&self) -> NaiveDateTime {
        self.as_of
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    /// Always false for a constructed universe; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Split tickers into ordered batches of at most `batch_size`.
    ///
    /// A `batch_size` of zero is treated as one.
    pub fn chunk(&self, batch_size: usize) -> Vec<Vec<String>> {
        self.tickers
            .chunks(batch_size.max(1))
            .map(|c| c.to_vec())
            .collect()
    }
}

fn validate_tickers(tickers: &[String]) -> Result<(), UniverseError> {
    if tickers.is_empty() {
        return Err(UniverseError::Empty);
    }

    let mut seen = HashSet::with_capacity(tickers.len());
    for (index, ticker) in tickers.iter().enumerate() {
        if ticker.trim().is_empty() {
            return Err(UniverseError::Blank { index });
        }
        if ticker == DATE_COL {
            return Err(UniverseError::ReservedTicker {
                ticker: ticker.clone(),
            });
        }
        if !seen.insert(ticker.as_str()) {
            return Err(UniverseError::Duplicate {
                ticker: ticker.clone(),
            });
        }
    }
    Ok(())
}
