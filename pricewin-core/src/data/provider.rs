//! Price source trait and structured error types.
//!
//! The PriceSource trait abstracts over whatever fetches and normalizes
//! remote market data into long-form `(timestamp, ticker, close)` rows, so
//! the pipeline can run against a CSV export, a live provider, or a mock.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Long-form price row as delivered by a source (before cleaning/coercion).
///
/// The timestamp may carry a time-of-day component; it is truncated to a
/// calendar date before storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPriceRow {
    pub timestamp: NaiveDateTime,
    pub ticker: String,
    pub close: f64,
}

impl RawPriceRow {
    pub fn new(timestamp: NaiveDateTime, ticker: impl Into<String>, close: f64) -> Self {
        Self {
            timestamp,
            ticker: ticker.into(),
            close,
        }
    }

    /// Row stamped at midnight of `date`.
    pub fn on_date(date: NaiveDate, ticker: impl Into<String>, close: f64) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN), ticker, close)
    }

    /// Calendar date with any time-of-day component dropped.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("batch rejected: {count} row(s) with NaN, infinite, or non-positive close")]
    BadValues { count: usize },

    #[error("price source '{source_name}' failed: {reason}")]
    Source { source_name: String, reason: String },

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("planned date out of range: {0}")]
    DateRange(String),
}

/// Trait for price sources (remote provider adapters, CSV exports, mocks).
///
/// Implementations return rows for the requested tickers whose timestamps
/// fall in `[start, end_exclusive)`. Retry and backoff belong here, not in
/// the pipeline.
pub trait PriceSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch long-form closes for a ticker batch over a date range.
    fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<RawPriceRow>, DataError>;
}

/// Call `source` once per ticker batch and concatenate the results.
pub fn fetch_batched(
    source: &dyn PriceSource,
    batches: &[Vec<String>],
    start: NaiveDate,
    end_exclusive: NaiveDate,
) -> Result<Vec<RawPriceRow>, DataError> {
    let mut rows = Vec::new();
    for (i, batch) in batches.iter().enumerate() {
        let fetched = source.fetch(batch, start, end_exclusive)?;
        tracing::debug!(
            source = source.name(),
            batch = i + 1,
            of = batches.len(),
            tickers = batch.len(),
            rows = fetched.len(),
            "fetched batch"
        );
        rows.extend(fetched);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingSource {
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl PriceSource for RecordingSource {
        fn name(&self) -> &str {
            "recording"
        }

        fn fetch(
            &self,
            tickers: &[String],
            start: NaiveDate,
            _end_exclusive: NaiveDate,
        ) -> Result<Vec<RawPriceRow>, DataError> {
            self.calls.borrow_mut().push(tickers.to_vec());
            Ok(tickers
                .iter()
                .map(|t| RawPriceRow::on_date(start, t.clone(), 1.0))
                .collect())
        }
    }

    #[test]
    fn fetch_batched_calls_once_per_batch() {
        let source = RecordingSource {
            calls: RefCell::new(Vec::new()),
        };
        let batches = vec![
            vec!["AAA".to_string(), "BBB".to_string()],
            vec!["CCC".to_string()],
        ];
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();

        let rows = fetch_batched(&source, &batches, start, end).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(source.calls.borrow().len(), 2);
        assert_eq!(source.calls.borrow()[1], vec!["CCC".to_string()]);
    }

    #[test]
    fn raw_row_date_drops_time_of_day() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap();
        let row = RawPriceRow::new(ts, "SPY", 500.0);
        assert_eq!(row.date(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }
}
