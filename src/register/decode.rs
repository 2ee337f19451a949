//! Decoding of bit fields read from an attendance register
//!
//! A field is read with `BITFIELD <key> GET u<width> 0`. Redis numbers bits
//! from the most significant bit of the first byte, so offset 0 (day 1) ends
//! up in the most significant position of the returned integer and offset
//! `width - 1` in the least significant:
//!
//! ```text
//! width = 5, days 1 2 3 5 marked
//!
//! register offsets   0 1 2 3 4
//! register bits      1 1 1 0 1
//! field value        0b11101 (= 29)
//!                        ^   ^
//!                    day 1   day 5 (LSB)
//! ```
//!
//! Both decoders walk the field from the least significant bit, i.e.
//! backwards in time from the last day covered by the field.
//!
//! # Test helpers
//!
//! [`encode_days`] builds the field Redis would return for a set of marked
//! days. The service never writes fields, only single bits, so it is used
//! by tests and benchmarks to produce inputs for the decoders.

use crate::types::{days_in_month, MonthMap, ISO_DATE_FORMAT};
use chrono::{Datelike, NaiveDate};

/// Widest field a single `BITFIELD GET` may return as unsigned
pub const MAX_UNSIGNED_FIELD_WIDTH: u32 = 63;

/// Keep only the low `width` bits of `field`
#[inline]
fn low_bits(field: u64, width: u32) -> u64 {
    if width >= u64::BITS {
        field
    } else {
        field & ((1u64 << width) - 1)
    }
}

/// Length of the run of marked days ending at the last day of the field
///
/// `field` covers days 1..=`width` with the last day in the least
/// significant bit. An unmarked last day is skipped so that "not marked yet
/// today" does not break the streak; any earlier gap ends it.
///
/// ```rust
/// use kuba_attendance::register::decode::current_streak;
///
/// // days 1, 2, 3 and 5 marked, reference day 5
/// assert_eq!(current_streak(0b11101, 5), 1);
/// // same register, reference day 3
/// assert_eq!(current_streak(0b111, 3), 3);
/// // reference day 4 not marked yet
/// assert_eq!(current_streak(0b1110, 4), 3);
/// ```
pub fn current_streak(field: u64, width: u32) -> u32 {
    if width == 0 {
        return 0;
    }

    let field = low_bits(field, width);
    if field & 1 == 1 {
        field.trailing_ones()
    } else {
        (field >> 1).trailing_ones()
    }
}

/// Expand a full-month field into one entry per day of `date`'s month
///
/// `field` must have been read with width `days_in_month(date)` so that its
/// least significant bit is the last day of the month.
pub fn decode_month(field: u64, date: NaiveDate) -> MonthMap {
    let days = days_in_month(date);
    let mut map = MonthMap::new();
    let mut value = field;

    for day in (1..=days).rev() {
        if let Some(d) = date.with_day(day) {
            map.insert(d.format(ISO_DATE_FORMAT).to_string(), value & 1 == 1);
        }
        value >>= 1;
    }

    map
}

/// Field value for a register with the given days marked
///
/// Test and benchmark helper, see the module docs. Days outside
/// `1..=width` are ignored.
///
/// ```rust
/// use kuba_attendance::register::decode::{current_streak, encode_days};
///
/// let field = encode_days(&[1, 2, 3, 5], 5);
/// assert_eq!(field, 0b11101);
/// assert_eq!(current_streak(field, 5), 1);
/// ```
pub fn encode_days(days: &[u32], width: u32) -> u64 {
    days.iter()
        .filter(|&&d| d >= 1 && d <= width && width - d < u64::BITS)
        .fold(0u64, |acc, &d| acc | 1u64 << (width - d))
}
