//! QC report and run-result signal persistence.
//!
//! Layout under `qc_out_dir`:
//! - `date=YYYY-MM-DD/qc_report.json`, one per run that wrote rows
//! - `last_run.json`, overwritten by every run that got past validation

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use pricewin_core::data::Universe;

pub const QC_REPORT_FILE: &str = "qc_report.json";
pub const RUN_SIGNAL_FILE: &str = "last_run.json";

/// Summary of one ingest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcReport {
    pub run_date: NaiveDate,
    pub fetched_dates: Vec<NaiveDate>,
    pub n_tickers: usize,
    /// Universe tickers with no row on the latest fetched date.
    pub missing_tickers: Vec<String>,
    pub duplicate_rows: usize,
    pub bad_value_rows: usize,
    pub notes: Vec<String>,
}

impl QcReport {
    pub fn build(
        run_date: NaiveDate,
        fetched_dates: Vec<NaiveDate>,
        universe: &Universe,
        missing_tickers: Vec<String>,
        duplicate_rows: usize,
        bad_value_rows: usize,
        notes: Vec<String>,
    ) -> Self {
        Self {
            run_date,
            fetched_dates,
            n_tickers: universe.len(),
            missing_tickers,
            duplicate_rows,
            bad_value_rows,
            notes,
        }
    }

    /// `{qc_out_dir}/date=YYYY-MM-DD/qc_report.json`
    pub fn path_for(qc_out_dir: &Path, run_date: NaiveDate) -> PathBuf {
        qc_out_dir
            .join(format!("date={}", run_date.format("%Y-%m-%d")))
            .join(QC_REPORT_FILE)
    }

    pub fn write_json(&self, qc_out_dir: &Path) -> std::io::Result<PathBuf> {
        let path = Self::path_for(qc_out_dir, self.run_date);
        write_json_atomic(&path, self)?;
        tracing::info!(path = %path.display(), "wrote qc report");
        Ok(path)
    }

    pub fn read_json(path: &Path) -> std::io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }
}

/// Tells external orchestration whether downstream compute should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSignal {
    pub run_date: NaiveDate,
    pub new_data: bool,
}

impl RunSignal {
    pub fn path_for(qc_out_dir: &Path) -> PathBuf {
        qc_out_dir.join(RUN_SIGNAL_FILE)
    }

    pub fn write_json(&self, qc_out_dir: &Path) -> std::io::Result<PathBuf> {
        let path = Self::path_for(qc_out_dir);
        write_json_atomic(&path, self)?;
        Ok(path)
    }

    /// `None` if no run has written a signal yet.
    pub fn read_json(qc_out_dir: &Path) -> std::io::Result<Option<Self>> {
        let path = Self::path_for(qc_out_dir);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(std::io::Error::other)
    }
}

/// Pretty JSON written to `{path}.tmp` and renamed into place.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn report() -> QcReport {
        let universe = Universe::new(vec!["AAPL".into(), "MSFT".into(), "SPY".into()]).unwrap();
        QcReport::build(
            d("2024-01-15"),
            vec![d("2024-01-12"), d("2024-01-15")],
            &universe,
            vec!["MSFT".into()],
            2,
            0,
            vec!["1 ticker(s) missing on 2024-01-15".into()],
        )
    }

    #[test]
    fn build_counts_universe() {
        assert_eq!(report().n_tickers, 3);
    }

    #[test]
    fn report_lands_in_date_partition() {
        let tmp = tempfile::tempdir().unwrap();
        let path = report().write_json(tmp.path()).unwrap();
        assert_eq!(path, tmp.path().join("date=2024-01-15").join("qc_report.json"));
        assert_eq!(QcReport::read_json(&path).unwrap(), report());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn report_json_uses_iso_dates() {
        let json = serde_json::to_string(&report()).unwrap();
        assert!(json.contains("\"run_date\":\"2024-01-15\""));
        assert!(json.contains("\"missing_tickers\":[\"MSFT\"]"));
    }

    #[test]
    fn run_signal_overwrites_previous() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(RunSignal::read_json(tmp.path()).unwrap(), None);

        RunSignal { run_date: d("2024-01-12"), new_data: true }
            .write_json(tmp.path())
            .unwrap();
        RunSignal { run_date: d("2024-01-13"), new_data: false }
            .write_json(tmp.path())
            .unwrap();

        let signal = RunSignal::read_json(tmp.path()).unwrap().unwrap();
        assert_eq!(signal.run_date, d("2024-01-13"));
        assert!(!signal.new_data);
    }
}
