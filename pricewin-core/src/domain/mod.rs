//! Domain types for the price warehouse

pub mod price;

pub use price::{is_bad_close, PriceRow};
