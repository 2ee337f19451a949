//! Attendance queries over monthly bit registers
//!
//! [`AttendanceService`] answers every question with exactly one store
//! command against the register for the reference date's month:
//!
//! | operation                | command                          |
//! |--------------------------|----------------------------------|
//! | `mark`                   | `SETBIT key day-1 1`             |
//! | `is_marked`              | `GETBIT key day-1`               |
//! | `count_marked`           | `BITCOUNT key`                   |
//! | `first_marked_day`       | `BITPOS key 1`                   |
//! | `longest_current_streak` | `BITFIELD key GET u<day> 0`      |
//! | `month_map`              | `BITFIELD key GET u<days> 0`     |
//!
//! Streaks never reach into the previous month.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use kuba_attendance::attendance::AttendanceService;
//! use kuba_attendance::engine::InMemoryBitmapStore;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), kuba_attendance::error::StoreError> {
//! let service = AttendanceService::new(InMemoryBitmapStore::new());
//! let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
//!
//! for d in [1, 2, 3, 5] {
//!     service.mark(7, day(d)).await?;
//! }
//!
//! assert_eq!(service.count_marked(7, day(1)).await, 4);
//! assert_eq!(service.first_marked_day(7, day(20)).await?, Some(day(1)));
//! assert_eq!(service.longest_current_streak(7, day(5)).await?, 1);
//! assert_eq!(service.longest_current_streak(7, day(3)).await?, 3);
//! # Ok(())
//! # }
//! ```

use crate::engine::traits::BitmapStore;
use crate::error::StoreError;
use crate::register::{current_streak, decode_month, KeyBuilder};
use crate::types::{date_for_offset, day_offset, days_in_month, MonthMap, UserId};

use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

/// Attendance query engine over an injected bitmap store
pub struct AttendanceService<S> {
    store: S,
    keys: KeyBuilder,
}

impl<S: BitmapStore> AttendanceService<S> {
    /// Create a service using the default key namespace
    pub fn new(store: S) -> Self {
        Self::with_keys(store, KeyBuilder::default())
    }

    /// Create a service with a custom key builder
    pub fn with_keys(store: S, keys: KeyBuilder) -> Self {
        Self { store, keys }
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Key builder used for registers
    pub fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    /// Mark attendance for `date`
    ///
    /// Returns whether the day was already marked. Marking twice is safe.
    pub async fn mark(&self, user_id: UserId, date: NaiveDate) -> Result<bool, StoreError> {
        let key = self.keys.build_key(user_id, date);
        let previous = self.store.set_bit(&key, day_offset(date), true).await?;
        debug!(user_id, %date, previous, "Marked attendance");
        Ok(previous)
    }

    /// Whether attendance was marked for `date`
    pub async fn is_marked(&self, user_id: UserId, date: NaiveDate) -> Result<bool, StoreError> {
        let key = self.keys.build_key(user_id, date);
        self.store.get_bit(&key, day_offset(date)).await
    }

    /// Number of marked days in `date`'s month, surfacing store failures
    pub async fn try_count_marked(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<u64, StoreError> {
        let key = self.keys.build_key(user_id, date);
        self.store.bit_count(&key).await
    }

    /// Number of marked days in `date`'s month
    ///
    /// Never fails: any store failure is logged and reported as zero.
    /// Use [`try_count_marked`](Self::try_count_marked) to see the error.
    pub async fn count_marked(&self, user_id: UserId, date: NaiveDate) -> u64 {
        match self.try_count_marked(user_id, date).await {
            Ok(count) => count,
            Err(e) => {
                warn!(user_id, %date, error = %e, "Attendance count unavailable, reporting 0");
                0
            },
        }
    }

    /// First marked day of `date`'s month, if any
    pub async fn first_marked_day(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Option<NaiveDate>, StoreError> {
        let key = self.keys.build_key(user_id, date);
        let position = self.store.bit_position(&key, true).await?;

        // Negative: nothing set. Past the month end: stale bits only.
        Ok(u32::try_from(position)
            .ok()
            .and_then(|offset| date_for_offset(date, offset)))
    }

    /// Consecutive marked days ending at `date`
    ///
    /// Only days 1..=`date.day()` of the month are read. An unmarked `date`
    /// does not break the run; any earlier gap does.
    pub async fn longest_current_streak(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<u32, StoreError> {
        let key = self.keys.build_key(user_id, date);
        let width = date.day();
        let field = self
            .store
            .bitfield_get_unsigned(&key, width, 0)
            .await?
            .unwrap_or(0);
        Ok(current_streak(field, width))
    }

    /// Marked state of every day in `date`'s month keyed by ISO date
    pub async fn month_map(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<MonthMap, StoreError> {
        let key = self.keys.build_key(user_id, date);
        let field = self
            .store
            .bitfield_get_unsigned(&key, days_in_month(date), 0)
            .await?
            .unwrap_or(0);
        Ok(decode_month(field, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InMemoryBitmapStore;
    use std::sync::Arc;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service() -> (AttendanceService<Arc<InMemoryBitmapStore>>, Arc<InMemoryBitmapStore>) {
        let store = Arc::new(InMemoryBitmapStore::new());
        (AttendanceService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_mark_then_is_marked() {
        let (service, _) = service();
        let date = ymd(2024, 3, 12);

        assert!(!service.is_marked(1, date).await.unwrap());
        assert!(!service.mark(1, date).await.unwrap());
        assert!(service.is_marked(1, date).await.unwrap());
        assert!(service.mark(1, date).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_writes_day_offset() {
        let (service, store) = service();
        service.mark(10000, ymd(2020, 1, 1)).await.unwrap();
        service.mark(10000, ymd(2020, 1, 10)).await.unwrap();

        assert_eq!(
            store.raw("u:sign:10000:202001"),
            Some(vec![0b1000_0000, 0b0100_0000])
        );
    }

    #[tokio::test]
    async fn test_count_marked_distinct_days() {
        let (service, _) = service();
        for d in [9, 3, 3, 27, 9, 1] {
            service.mark(5, ymd(2024, 5, d)).await.unwrap();
        }
        assert_eq!(service.count_marked(5, ymd(2024, 5, 31)).await, 4);
        assert_eq!(service.count_marked(5, ymd(2024, 6, 1)).await, 0);
    }

    #[tokio::test]
    async fn test_count_marked_degrades_to_zero() {
        let (service, store) = service();
        service.mark(5, ymd(2024, 5, 1)).await.unwrap();

        store.fail_with(StoreError::Unavailable("down".to_string()));
        assert_eq!(service.count_marked(5, ymd(2024, 5, 1)).await, 0);
        assert!(service.try_count_marked(5, ymd(2024, 5, 1)).await.is_err());

        store.recover();
        assert_eq!(service.count_marked(5, ymd(2024, 5, 1)).await, 1);
    }

    #[tokio::test]
    async fn test_first_marked_day() {
        let (service, _) = service();
        let date = ymd(2024, 3, 20);
        assert_eq!(service.first_marked_day(1, date).await.unwrap(), None);

        for d in [5, 3, 9] {
            service.mark(1, ymd(2024, 3, d)).await.unwrap();
        }
        assert_eq!(
            service.first_marked_day(1, date).await.unwrap(),
            Some(ymd(2024, 3, 3))
        );
    }

    #[tokio::test]
    async fn test_first_marked_day_ignores_stale_offsets() {
        let (service, store) = service();
        // Offset 30 does not exist in February
        store.set_bit("u:sign:1:202302", 30, true).await.unwrap();
        assert_eq!(service.first_marked_day(1, ymd(2023, 2, 1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_streak() {
        let (service, _) = service();
        for d in [1, 2, 3, 5] {
            service.mark(1, ymd(2024, 3, d)).await.unwrap();
        }

        assert_eq!(service.longest_current_streak(1, ymd(2024, 3, 5)).await.unwrap(), 1);
        assert_eq!(service.longest_current_streak(1, ymd(2024, 3, 3)).await.unwrap(), 3);
        assert_eq!(service.longest_current_streak(1, ymd(2024, 3, 4)).await.unwrap(), 3);
        assert_eq!(service.longest_current_streak(1, ymd(2024, 3, 6)).await.unwrap(), 1);
        assert_eq!(service.longest_current_streak(1, ymd(2024, 3, 7)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_streak_day_one_unmarked() {
        let (service, _) = service();
        assert_eq!(service.longest_current_streak(1, ymd(2024, 3, 1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_streak_does_not_cross_month() {
        let (service, _) = service();
        for d in 25..=29 {
            service.mark(1, ymd(2024, 2, d)).await.unwrap();
        }
        service.mark(1, ymd(2024, 3, 1)).await.unwrap();

        assert_eq!(service.longest_current_streak(1, ymd(2024, 3, 1)).await.unwrap(), 1);
        assert_eq!(service.longest_current_streak(1, ymd(2024, 2, 29)).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_month_map_leap_february() {
        let (service, _) = service();
        for d in [1, 14, 29] {
            service.mark(3, ymd(2024, 2, d)).await.unwrap();
        }

        let map = service.month_map(3, ymd(2024, 2, 15)).await.unwrap();
        assert_eq!(map.len(), 29);
        assert!(map["2024-02-01"]);
        assert!(!map["2024-02-02"]);
        assert!(map["2024-02-14"]);
        assert!(map["2024-02-29"]);
        assert_eq!(map.values().filter(|&&v| v).count(), 3);
    }

    #[tokio::test]
    async fn test_month_map_unwritten_register() {
        let (service, _) = service();
        let map = service.month_map(3, ymd(2023, 11, 2)).await.unwrap();
        assert_eq!(map.len(), 30);
        assert!(map.values().all(|&v| !v));
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let (service, store) = service();
        let date = ymd(2024, 3, 5);
        let err = StoreError::CommandFailure("WRONGTYPE".to_string());
        store.fail_with(err.clone());

        assert_eq!(service.mark(1, date).await, Err(err.clone()));
        assert_eq!(service.is_marked(1, date).await, Err(err.clone()));
        assert_eq!(service.first_marked_day(1, date).await, Err(err.clone()));
        assert_eq!(service.longest_current_streak(1, date).await, Err(err.clone()));
        assert_eq!(service.month_map(1, date).await, Err(err));
    }

    #[tokio::test]
    async fn test_one_command_per_operation() {
        let (service, store) = service();
        let date = ymd(2024, 3, 5);

        service.mark(1, date).await.unwrap();
        service.is_marked(1, date).await.unwrap();
        service.count_marked(1, date).await;
        service.first_marked_day(1, date).await.unwrap();
        service.longest_current_streak(1, date).await.unwrap();
        service.month_map(1, date).await.unwrap();

        assert_eq!(store.commands_executed(), 6);
    }

    #[tokio::test]
    async fn test_custom_namespace() {
        let store = Arc::new(InMemoryBitmapStore::new());
        let service = AttendanceService::with_keys(store.clone(), KeyBuilder::new("att"));
        service.mark(9, ymd(2024, 7, 4)).await.unwrap();

        assert!(store.raw("att:9:202407").is_some());
        assert_eq!(service.keys().namespace(), "att");
    }
}
