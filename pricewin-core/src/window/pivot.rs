//! Long-to-wide pivot of a window.
//!
//! Rows are the sorted distinct dates, columns the sorted distinct tickers.
//! A ticker with no row on a date leaves its cell empty (no forward-fill).

use crate::data::provider::DataError;
use crate::data::schema::{date_to_days, DATE_COL};
use crate::domain::PriceRow;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Dense dates × tickers matrix of closes.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMatrix {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    /// Row-major: `values[row][col]`.
    values: Vec<Vec<Option<f64>>>,
}

impl WindowMatrix {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.tickers.len()
    }

    pub fn row(&self, index: usize) -> Option<&[Option<f64>]> {
        self.values.get(index).map(|r| r.as_slice())
    }

    /// Close for `(date, ticker)`, `None` if either is absent or the cell is empty.
    pub fn get(&self, date: NaiveDate, ticker: &str) -> Option<f64> {
        let r = self.dates.binary_search(&date).ok()?;
        let c = self.tickers.binary_search_by(|t| t.as_str().cmp(ticker)).ok()?;
        self.values[r][c]
    }

    /// Count of empty cells.
    pub fn missing_cells(&self) -> usize {
        self.values.iter().flatten().filter(|v| v.is_none()).count()
    }

    /// `date` column followed by one Float64 column per ticker.
    pub fn to_dataframe(&self) -> Result<DataFrame, DataError> {
        let days: Vec<i32> = self.dates.iter().map(|d| date_to_days(*d)).collect();
        let mut columns = Vec::with_capacity(self.tickers.len() + 1);
        columns.push(
            Column::new(DATE_COL.into(), days)
                .cast(&DataType::Date)
                .map_err(|e| DataError::Parquet(format!("date cast: {e}")))?,
        );
        for (c, ticker) in self.tickers.iter().enumerate() {
            let col_values: Vec<Option<f64>> = self.values.iter().map(|row| row[c]).collect();
            columns.push(Column::new(ticker.as_str().into(), col_values));
        }
        DataFrame::new(columns).map_err(|e| DataError::Parquet(format!("dataframe creation: {e}")))
    }
}

/// Pivot long-form rows into a [`WindowMatrix`].
///
/// Output ordering depends only on the set of rows, not their input order.
pub fn pivot(rows: &[PriceRow]) -> WindowMatrix {
    let tickers: Vec<String> = rows
        .iter()
        .map(|r| r.ticker.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let col_of: BTreeMap<&str, usize> = tickers
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i))
        .collect();

    let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        let cells = by_date
            .entry(row.date)
            .or_insert_with(|| vec![None; tickers.len()]);
        if let Some(&c) = col_of.get(row.ticker.as_str()) {
            cells[c] = Some(row.close);
        }
    }

    let (dates, values) = by_date.into_iter().unzip();
    WindowMatrix {
        dates,
        tickers,
        values,
    }
}
