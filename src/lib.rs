//! Kuba Attendance - monthly attendance registers on Redis bitmaps
//!
//! This library keeps one bit per day for every user and month:
//! - One Redis string per (user, month), bit `day - 1` set when attended
//! - Marking, lookups and counts in a single bit command each
//! - Current streak and full-month maps decoded from one `BITFIELD` read
//! - Pluggable stores: Redis for production, in-memory for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attendance;
pub mod engine;
pub mod error;
pub mod register;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Tracing subscriber setup
pub mod logging;

/// Redis bitmap store and connection pool
pub mod redis;

// Re-export main types
pub use attendance::AttendanceService;
pub use engine::{BitmapStore, InMemoryBitmapStore};
pub use error::{Error, Result, StoreError};
pub use types::{MonthMap, UserId};
