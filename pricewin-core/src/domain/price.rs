//! PriceRow: one closing price for one ticker on one trading day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical long-form price row as stored in the warehouse.
///
/// `(date, ticker)` is the primary key. Rows that reach storage always
/// carry a finite, strictly positive `close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub close: f64,
}

impl PriceRow {
    pub fn new(date: NaiveDate, ticker: impl Into<String>, close: f64) -> Self {
        Self {
            date,
            ticker: ticker.into(),
            close,
        }
    }

    /// Borrowed primary key.
    pub fn key(&self) -> (NaiveDate, &str) {
        (self.date, self.ticker.as_str())
    }

    /// True if `close` is NaN, infinite, or not strictly positive.
    pub fn has_bad_close(&self) -> bool {
        is_bad_close(self.close)
    }
}

/// Shared bad-value predicate for closes coming from any source.
pub fn is_bad_close(close: f64) -> bool {
    !close.is_finite() || close <= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn bad_close_detection() {
        assert!(is_bad_close(f64::NAN));
        assert!(is_bad_close(f64::INFINITY));
        assert!(is_bad_close(f64::NEG_INFINITY));
        assert!(is_bad_close(0.0));
        assert!(is_bad_close(-1.0));
        assert!(!is_bad_close(0.01));
    }

    #[test]
    fn key_orders_by_date_then_ticker() {
        let a = PriceRow::new(d("2024-01-02"), "MSFT", 10.0);
        let b = PriceRow::new(d("2024-01-02"), "AAPL", 10.0);
        let c = PriceRow::new(d("2024-01-01"), "ZZZ", 10.0);
        assert!(b.key() < a.key());
        assert!(c.key() < b.key());
    }
}
