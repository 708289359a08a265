//! Long-form CSV export as a price source.
//!
//! Expected header: `date,ticker,close`. Dates may be `YYYY-MM-DD` or carry
//! a time (`YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD HH:MM:SS`). An empty close is
//! read as NaN so the bad-value gate rejects it rather than the parser.

use super::provider::{DataError, PriceSource, RawPriceRow};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRecord {
    date: String,
    ticker: String,
    close: Option<f64>,
}

/// Price source reading a normalized long-form CSV file.
pub struct CsvPriceSource {
    path: PathBuf,
    rows: Vec<RawPriceRow>,
}

impl CsvPriceSource {
    /// Read and parse the whole file up front.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DataError> {
        let path = path.into();
        let file = std::fs::File::open(&path)
            .map_err(|e| DataError::Csv(format!("open {}: {e}", path.display())))?;
        let rows = parse_rows(file)?;
        tracing::debug!(path = %path.display(), rows = rows.len(), "loaded csv price source");
        Ok(Self { path, rows })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PriceSource for CsvPriceSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<RawPriceRow>, DataError> {
        let wanted: HashSet<&str> = tickers.iter().map(|t| t.as_str()).collect();
        Ok(self
            .rows
            .iter()
            .filter(|r| wanted.contains(r.ticker.as_str()))
            .filter(|r| r.date() >= start && r.date() < end_exclusive)
            .cloned()
            .collect())
    }
}

fn parse_rows<R: std::io::Read>(reader: R) -> Result<Vec<RawPriceRow>, DataError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (i, record) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record = record.map_err(|e| DataError::Csv(format!("row {}: {e}", i + 1)))?;
        let timestamp = parse_timestamp(record.date.trim())
            .ok_or_else(|| DataError::Csv(format!("row {}: bad date '{}'", i + 1, record.date)))?;
        rows.push(RawPriceRow {
            timestamp,
            ticker: record.ticker,
            close: record.close.unwrap_or(f64::NAN),
        });
    }
    Ok(rows)
}

/// Accepts a plain date or a date with time of day.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    const SAMPLE: &str = "date,ticker,close\n\
        2024-01-02,SPY,470.5\n\
        2024-01-02T16:00:00,AAPL,185.1\n\
        2024-01-03,SPY,\n\
        2024-01-04,QQQ,400.0\n";

    #[test]
    fn parses_dates_and_empty_close() {
        let rows = parse_rows(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].date(), d("2024-01-02"));
        assert!(rows[2].close.is_nan());
    }

    #[test]
    fn rejects_unparseable_date() {
        let err = parse_rows("date,ticker,close\n01/02/2024,SPY,1.0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::Csv(_)));
    }

    #[test]
    fn fetch_filters_tickers_and_range() {
        let source = CsvPriceSource {
            path: PathBuf::from("mem"),
            rows: parse_rows(SAMPLE.as_bytes()).unwrap(),
        };
        let tickers = vec!["SPY".to_string(), "QQQ".to_string()];
        let rows = source.fetch(&tickers, d("2024-01-02"), d("2024-01-04")).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.ticker == "SPY"));
    }
}
