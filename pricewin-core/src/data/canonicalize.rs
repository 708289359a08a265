//! Canonicalizer for freshly fetched price rows.
//!
//! Applied in order before anything reaches the warehouse:
//! 1. dedupe on `(date, ticker)`, first occurrence wins
//! 2. bad-value gate: any NaN / infinite / non-positive close rejects the whole batch
//! 3. coercion into canonical [`PriceRow`]s (calendar date, no time component)

use super::provider::{DataError, RawPriceRow};
use crate::domain::{is_bad_close, PriceRow};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};

/// Output of a successful clean.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedBatch {
    pub rows: Vec<PriceRow>,
    pub duplicate_count: usize,
}

impl CleanedBatch {
    /// Most recent date present in the batch.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.date).max()
    }
}

/// Canonicalizer for long-form price rows
pub struct Canonicalizer;

impl Canonicalizer {
    /// Run dedupe, the bad-value gate, and coercion.
    ///
    /// Fails with [`DataError::BadValues`] if any surviving row has a bad
    /// close; no row of such a batch may be stored.
    pub fn clean(raw: Vec<RawPriceRow>) -> Result<CleanedBatch, DataError> {
        let (deduped, duplicate_count) = Self::dedupe(raw);

        let bad = Self::count_bad_values(&deduped);
        if bad > 0 {
            tracing::warn!(bad_value_rows = bad, duplicate_count, "rejecting fetched batch");
            return Err(DataError::BadValues { count: bad });
        }

        Ok(CleanedBatch {
            rows: Self::coerce(deduped),
            duplicate_count,
        })
    }

    /// Drop repeated `(date, ticker)` keys, keeping the first occurrence.
    ///
    /// Keys use the calendar date, so two intraday stamps on the same day
    /// collide. Returns the surviving rows (input order preserved) and the
    /// number dropped.
    pub fn dedupe(raw: Vec<RawPriceRow>) -> (Vec<RawPriceRow>, usize) {
        let before = raw.len();
        let mut seen: HashSet<(NaiveDate, String)> = HashSet::with_capacity(before);
        let kept: Vec<RawPriceRow> = raw
            .into_iter()
            .filter(|r| seen.insert((r.date(), r.ticker.clone())))
            .collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }

    /// Count rows whose close is NaN, infinite, or `<= 0`.
    pub fn count_bad_values(rows: &[RawPriceRow]) -> usize {
        rows.iter().filter(|r| is_bad_close(r.close)).count()
    }

    /// Normalize into storage rows: plain calendar date, owned ticker, f64 close.
    pub fn coerce(rows: Vec<RawPriceRow>) -> Vec<PriceRow> {
        rows.into_iter()
            .map(|r| PriceRow {
                date: r.timestamp.date(),
                ticker: r.ticker,
                close: r.close,
            })
            .collect()
    }
}

/// Universe tickers with no row on `date`, sorted ascending.
pub fn find_missing_tickers(rows: &[PriceRow], tickers: &[String], date: NaiveDate) -> Vec<String> {
    let present: HashSet<&str> = rows
        .iter()
        .filter(|r| r.date == date)
        .map(|r| r.ticker.as_str())
        .collect();

    tickers
        .iter()
        .filter(|t| !present.contains(t.as_str()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
