//! Monthly attendance registers
//!
//! A register is a bit string in the store, one per user and month. The bit
//! at offset `day - 1` is set when the user marked attendance on that day.
//!
//! # Modules
//!
//! - [`key`]: derives the store key of a register
//! - [`decode`]: interprets bit fields read from a register

pub mod decode;
pub mod key;

pub use decode::{current_streak, decode_month, MAX_UNSIGNED_FIELD_WIDTH};
pub use key::{KeyBuilder, DEFAULT_NAMESPACE};
