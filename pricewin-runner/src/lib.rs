//! Pricewin Runner: run orchestration over `pricewin-core`.
//!
//! - TOML ingest configuration
//! - Daily ingest pipeline with QC report and run signal
//! - Window backfill from the stored warehouse

pub mod config;
pub mod pipeline;
pub mod qc;

pub use config::{ConfigError, IngestConfig};
pub use pipeline::{
    backfill_windows, load_universe, open_store, run_daily_ingest, run_with_universe, RunError,
    RunResult,
};
pub use qc::{QcReport, RunSignal};
