//! Core data types used throughout the attendance register
//!
//! # Key Types
//!
//! - **`UserId`**: numeric identifier of the user owning a register
//! - **`MonthMap`**: day-by-day attendance for one calendar month
//!
//! Calendar helpers translate between the 1-based day of month used in the
//! public API and the 0-based bit offset used inside a register.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use kuba_attendance::types::{day_offset, days_in_month};
//!
//! let date = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
//! assert_eq!(days_in_month(date), 29);
//! assert_eq!(day_offset(date), 14);
//! ```

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

/// Unique identifier for a user
pub type UserId = u64;

/// Attendance for every day of a month, keyed by ISO date (`YYYY-MM-DD`)
///
/// Iteration is chronological because ISO dates sort lexically, but callers
/// should not treat the order as part of the contract.
pub type MonthMap = BTreeMap<String, bool>;

/// Format used for month map keys
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Number of days in the month containing `date` (28..=31)
pub fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = (date.year(), date.month());
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    // Only fails past the last representable year, where the month is December
    first_of_next
        .and_then(|d| d.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Bit offset of `date`'s day inside its monthly register
#[inline]
pub fn day_offset(date: NaiveDate) -> u32 {
    date.day() - 1
}

/// Date in `date`'s month whose bit sits at `offset`
///
/// Returns `None` when the offset falls past the end of the month.
pub fn date_for_offset(date: NaiveDate, offset: u32) -> Option<NaiveDate> {
    if offset >= days_in_month(date) {
        return None;
    }
    date.with_day(offset + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(ymd(2024, 1, 10)), 31);
        assert_eq!(days_in_month(ymd(2024, 2, 1)), 29);
        assert_eq!(days_in_month(ymd(2023, 2, 28)), 28);
        assert_eq!(days_in_month(ymd(2100, 2, 1)), 28);
        assert_eq!(days_in_month(ymd(2000, 2, 1)), 29);
        assert_eq!(days_in_month(ymd(2024, 4, 30)), 30);
        assert_eq!(days_in_month(ymd(2024, 12, 31)), 31);
    }

    #[test]
    fn test_day_offset_is_zero_based() {
        assert_eq!(day_offset(ymd(2024, 3, 1)), 0);
        assert_eq!(day_offset(ymd(2024, 3, 31)), 30);
    }

    #[test]
    fn test_date_for_offset() {
        let date = ymd(2024, 3, 17);
        assert_eq!(date_for_offset(date, 0), Some(ymd(2024, 3, 1)));
        assert_eq!(date_for_offset(date, 2), Some(ymd(2024, 3, 3)));
        assert_eq!(date_for_offset(date, 30), Some(ymd(2024, 3, 31)));
        assert_eq!(date_for_offset(date, 31), None);

        // Stale bit from a longer month
        assert_eq!(date_for_offset(ymd(2023, 2, 1), 28), None);
    }
}
