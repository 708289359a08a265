//! Ingest configuration loaded from TOML.
//!
//! ```toml
//! universe_path = "config/universe.csv"
//! price_store_dir = "data/prices"
//! qc_out_dir = "out/qc"
//! compute_inputs_dir = "data/compute_inputs"
//! timezone = "America/New_York"
//! batch_size = 50
//! lookback_buffer_days = 5
//! prefer_adjusted = true
//! window_length = 51
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_LOOKBACK_BUFFER_DAYS: u32 = 5;
/// Upper bound on the cold-start buffer (about ten years of calendar days).
pub const MAX_LOOKBACK_BUFFER_DAYS: u32 = 3650;
/// 51 closes give the 50 returns the compute engine consumes.
pub const DEFAULT_WINDOW_LENGTH: usize = 51;
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Errors from loading or validating a config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Paths and knobs for one ingest deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestConfig {
    /// CSV file with a `ticker` column.
    pub universe_path: PathBuf,
    /// Directory holding `prices.parquet` and its sidecar.
    pub price_store_dir: PathBuf,
    /// Root for `date=YYYY-MM-DD/qc_report.json` and `last_run.json`.
    pub qc_out_dir: PathBuf,
    /// Where window artifacts and the latest alias land.
    pub compute_inputs_dir: PathBuf,

    /// Market timezone label. Run dates are supplied by the caller.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_lookback_buffer_days")]
    pub lookback_buffer_days: u32,

    /// Forwarded to source adapters that distinguish adjusted closes.
    #[serde(default = "default_prefer_adjusted")]
    pub prefer_adjusted: bool,

    #[serde(default = "default_window_length")]
    pub window_length: usize,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_lookback_buffer_days() -> u32 {
    DEFAULT_LOOKBACK_BUFFER_DAYS
}

fn default_prefer_adjusted() -> bool {
    true
}

fn default_window_length() -> usize {
    DEFAULT_WINDOW_LENGTH
}

impl IngestConfig {
    /// Config rooted at `root` using the conventional layout and defaults.
    pub fn with_root(root: &Path) -> Self {
        Self {
            universe_path: root.join("config/universe.csv"),
            price_store_dir: root.join("data/prices"),
            qc_out_dir: root.join("out/qc"),
            compute_inputs_dir: root.join("data/compute_inputs"),
            timezone: default_timezone(),
            batch_size: DEFAULT_BATCH_SIZE,
            lookback_buffer_days: DEFAULT_LOOKBACK_BUFFER_DAYS,
            prefer_adjusted: true,
            window_length: DEFAULT_WINDOW_LENGTH,
        }
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be > 0".into()));
        }
        if self.lookback_buffer_days > MAX_LOOKBACK_BUFFER_DAYS {
            return Err(ConfigError::Invalid(format!(
                "lookback_buffer_days must be <= {MAX_LOOKBACK_BUFFER_DAYS}, got {}",
                self.lookback_buffer_days
            )));
        }
        if self.window_length < 2 {
            return Err(ConfigError::Invalid(format!(
                "window_length must be >= 2, got {}",
                self.window_length
            )));
        }
        for (name, path) in [
            ("universe_path", &self.universe_path),
            ("price_store_dir", &self.price_store_dir),
            ("qc_out_dir", &self.qc_out_dir),
            ("compute_inputs_dir", &self.compute_inputs_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Create the store, QC, and compute-input directories if absent.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [&self.price_store_dir, &self.qc_out_dir, &self.compute_inputs_dir] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
