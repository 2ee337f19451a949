//! Redis backend for attendance registers
//!
//! Registers are plain Redis strings manipulated with the bit commands.
//!
//! # Architecture
//!
//! ```text
//! Redis Schema:
//! u:sign:{user_id}:{YYYYMM}    → STRING, bit (day - 1) set when attended
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use kuba_attendance::redis::{RedisBitmapStore, RedisConfig};
//! use kuba_attendance::engine::BitmapStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisBitmapStore::new(RedisConfig::default()).await?;
//! assert_eq!(store.store_id(), "redis-bitmap-v1");
//! # Ok(())
//! # }
//! ```

pub mod bitmap;
pub mod connection;
pub mod util;

#[cfg(test)]
pub(crate) mod scripted;

pub use bitmap::RedisBitmapStore;
pub use connection::{PoolMetricsSnapshot, RedisConfig, RedisPool, RetryPolicy};
