//! Trailing-window selection over the long-form warehouse.
//!
//! A window is the last `window_length` distinct trading dates on or before
//! a target date. Fewer available dates is reported as insufficient; the
//! window is never padded.

use crate::domain::PriceRow;
use chrono::NaiveDate;

/// Result of selecting a window for one end date.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowSelection<'a> {
    /// All rows whose date lies in the window, sorted by `(date, ticker)`.
    Selected(&'a [PriceRow]),
    /// Fewer than `required` distinct dates exist on or before the end date.
    Insufficient { available: usize, required: usize },
}

impl WindowSelection<'_> {
    pub fn is_selected(&self) -> bool {
        matches!(self, WindowSelection::Selected(_))
    }
}

/// Reusable selector: sorts the table once, then answers many end dates.
pub struct WindowSelector {
    rows: Vec<PriceRow>,
    dates: Vec<NaiveDate>,
}

impl WindowSelector {
    pub fn new(rows: &[PriceRow]) -> Self {
        let mut rows = rows.to_vec();
        rows.sort_by(|a, b| a.key().cmp(&b.key()));
        let mut dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        dates.dedup();
        Self { rows, dates }
    }

    /// Distinct trading dates in the table, ascending.
    pub fn trading_dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Rows for the last `window_length` trading dates ending on or before `end_date`.
    pub fn select(&self, window_length: usize, end_date: NaiveDate) -> WindowSelection<'_> {
        let available = self.dates.partition_point(|d| *d <= end_date);
        if window_length == 0 || available < window_length {
            return WindowSelection::Insufficient {
                available,
                required: window_length,
            };
        }

        let cutoff = self.dates[available - window_length];
        let lo = self.rows.partition_point(|r| r.date < cutoff);
        let hi = self.rows.partition_point(|r| r.date <= end_date);
        WindowSelection::Selected(&self.rows[lo..hi])
    }
}

/// One-shot selection; returns owned rows or `None` when history is insufficient.
pub fn select_window(rows: &[PriceRow], window_length: usize, end_date: NaiveDate) -> Option<Vec<PriceRow>> {
    match WindowSelector::new(rows).select(window_length, end_date) {
        WindowSelection::Selected(slice) => Some(slice.to_vec()),
        WindowSelection::Insufficient { .. } => None,
    }
}
