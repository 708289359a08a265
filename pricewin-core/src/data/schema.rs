use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01; polars `Date` counts from the latter.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub const DATE_COL: &str = "date";
pub const TICKER_COL: &str = "ticker";
pub const CLOSE_COL: &str = "close";

/// Long-form warehouse layout: one row per `(date, ticker)`.
pub struct PriceSchema;

impl PriceSchema {
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(DATE_COL.into(), DataType::Date),
            Field::new(TICKER_COL.into(), DataType::String),
            Field::new(CLOSE_COL.into(), DataType::Float64),
        ])
    }

    /// Check that every warehouse column is present with its storage type.
    ///
    /// Extra columns are tolerated; they are dropped on the next rewrite.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let actual = df.schema();
        Self::schema().iter_fields().try_for_each(|field| {
            match actual.get(field.name()) {
                None => Err(SchemaError::MissingColumn(field.name().to_string())),
                Some(dtype) if dtype != field.dtype() => Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: dtype.clone(),
                }),
                Some(_) => Ok(()),
            }
        })
    }
}

/// Encode a calendar date as a polars `Date` physical value.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Decode a polars `Date` physical value.
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("warehouse table is missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' has type {actual:?}, expected {expected:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
