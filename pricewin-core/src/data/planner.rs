//! Date-gap planning: which calendar days a run should fetch.
//!
//! The planned bounds are `start` and `end = today + 1`:
//! - cold start: `start = today - (lookback_buffer_days + 30)`
//! - otherwise: `start = last_stored + 1`
//!
//! The day list runs from `start` through `end` inclusive and is empty when
//! `start >= end`. Sources receive `end` as an exclusive bound, so the extra
//! trailing day is never actually requested. Non-trading days are included;
//! the source simply returns no rows for them.
//!
//! Bounds that fall outside chrono's calendar are a [`DataError::DateRange`].

use super::provider::DataError;
use chrono::{Duration, NaiveDate};

/// Extra history fetched on a cold start on top of the lookback buffer.
pub const COLD_START_EXTRA_DAYS: i64 = 30;

/// Planned fetch bounds. `end_exclusive` is handed to the source as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRange {
    pub start: NaiveDate,
    pub end_exclusive: NaiveDate,
}

impl FetchRange {
    /// Compute the fetch range for a run.
    pub fn plan(
        last_stored: Option<NaiveDate>,
        today: NaiveDate,
        lookback_buffer_days: u32,
    ) -> Result<Self, DataError> {
        let start = match last_stored {
            Some(last) => last
                .checked_add_signed(Duration::days(1))
                .ok_or_else(|| DataError::DateRange(format!("day after last stored {last}")))?,
            None => {
                let back = i64::from(lookback_buffer_days) + COLD_START_EXTRA_DAYS;
                today.checked_sub_signed(Duration::days(back)).ok_or_else(|| {
                    DataError::DateRange(format!("{back} days before {today}"))
                })?
            }
        };
        let end_exclusive = today
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| DataError::DateRange(format!("day after {today}")))?;
        Ok(Self {
            start,
            end_exclusive,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end_exclusive
    }

    /// Planned calendar days, ascending, `start..=end_exclusive`.
    pub fn days(&self) -> Vec<NaiveDate> {
        if self.is_empty() {
            return Vec::new();
        }
        self.start
            .iter_days()
            .take_while(|d| *d <= self.end_exclusive)
            .collect()
    }
}

/// Calendar days to fetch given the last stored date and today.
pub fn plan(
    last_stored: Option<NaiveDate>,
    today: NaiveDate,
    lookback_buffer_days: u32,
) -> Result<Vec<NaiveDate>, DataError> {
    Ok(FetchRange::plan(last_stored, today, lookback_buffer_days)?.days())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn incremental_plan_starts_after_last_stored() {
        let days = plan(Some(d("2024-01-10")), d("2024-01-15"), 5).unwrap();
        assert_eq!(days.len(), 6);
        assert_eq!(days.first(), Some(&d("2024-01-11")));
        assert_eq!(days.last(), Some(&d("2024-01-16")));
    }

    #[test]
    fn cold_start_covers_buffer_plus_thirty_days() {
        let days = plan(None, d("2024-01-15"), 5).unwrap();
        assert_eq!(days.first(), Some(&d("2023-12-11")));
        assert_eq!(days.last(), Some(&d("2024-01-16")));
        assert_eq!(days.len(), 37);
    }

    #[test]
    fn includes_weekends() {
        // 2024-01-13 is a Saturday
        let days = plan(Some(d("2024-01-12")), d("2024-01-14"), 0).unwrap();
        assert!(days.contains(&d("2024-01-13")));
        assert!(days.contains(&d("2024-01-14")));
    }

    #[test]
    fn empty_when_store_is_ahead_of_today() {
        let range = FetchRange::plan(Some(d("2024-01-20")), d("2024-01-15"), 5).unwrap();
        assert!(range.is_empty());
        assert!(range.days().is_empty());
    }

    #[test]
    fn up_to_date_store_plans_nothing() {
        // last_stored == today: start == end
        let days = plan(Some(d("2024-01-15")), d("2024-01-15"), 5).unwrap();
        assert!(days.is_empty());
    }

    #[test]
    fn huge_cold_start_buffer_is_an_error() {
        let err = plan(None, d("2024-01-15"), u32::MAX).unwrap_err();
        assert!(matches!(err, DataError::DateRange(_)));
    }

    #[test]
    fn calendar_edge_is_an_error() {
        let err = FetchRange::plan(None, NaiveDate::MAX, 5).unwrap_err();
        assert!(matches!(err, DataError::DateRange(_)));
        let err = FetchRange::plan(Some(NaiveDate::MAX), d("2024-01-15"), 5).unwrap_err();
        assert!(matches!(err, DataError::DateRange(_)));
    }
}
