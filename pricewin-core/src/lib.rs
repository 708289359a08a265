//! Pricewin Core: price warehouse and rolling-window materialization.
//!
//! This crate contains the storage and windowing core:
//! - Domain types (price rows) and the validated ticker universe
//! - Date-gap planning for incremental fetches
//! - Batch cleaning with an all-or-nothing bad-value gate
//! - Merge-upsert warehouse behind the `PriceStore` trait (Parquet and in-memory)
//! - Strict-length trailing window selection, pivoting, and artifact writing

pub mod data;
pub mod domain;
pub mod window;
