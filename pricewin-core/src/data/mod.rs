//! Data ingestion and storage

pub mod canonicalize;
pub mod csv_source;
pub mod planner;
pub mod provider;
pub mod schema;
pub mod universe;
pub mod warehouse;

pub use canonicalize::{find_missing_tickers, Canonicalizer, CleanedBatch};
pub use csv_source::CsvPriceSource;
pub use planner::{plan, FetchRange};
pub use provider::{fetch_batched, DataError, PriceSource, RawPriceRow};
pub use schema::PriceSchema;
pub use universe::{Universe, UniverseError};
pub use warehouse::{
    distinct_dates, merge_rows, MemoryWarehouse, ParquetWarehouse, PriceStore, WarehouseMeta,
    WarehouseStatus,
};
