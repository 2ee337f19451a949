//! In-memory bitmap store
//!
//! [`InMemoryBitmapStore`] is a process-local stand-in for Redis intended for:
//! - **Unit testing** without a running Redis server
//! - **Integration testing** of the attendance service
//! - **Development and prototyping**
//!
//! It reproduces the Redis string bit layout exactly (offset 0 is the most
//! significant bit of byte 0), so bit fields decode the same way they would
//! against a real server.
//!
//! Failures can be injected with [`InMemoryBitmapStore::fail_with`] to drive
//! error paths; every command fails until [`InMemoryBitmapStore::recover`].
//!
//! # Warning
//!
//! Data lives only as long as the store value. Not for production use.
//!
//! # Example
//!
//! ```rust
//! use kuba_attendance::engine::{BitmapStore, InMemoryBitmapStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), kuba_attendance::error::StoreError> {
//! let store = InMemoryBitmapStore::new();
//! store.set_bit("k", 0, true).await?;
//! assert_eq!(store.bitfield_get_unsigned("k", 8, 0).await?, Some(128));
//! # Ok(())
//! # }
//! ```

use crate::engine::traits::BitmapStore;
use crate::error::StoreError;
use crate::register::MAX_UNSIGNED_FIELD_WIDTH;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory bitmap store with Redis bit semantics
pub struct InMemoryBitmapStore {
    /// key -> raw string bytes
    values: RwLock<HashMap<String, Vec<u8>>>,
    /// Error returned by every command while set
    failure: RwLock<Option<StoreError>>,
    /// Commands received, including failed ones
    commands: AtomicU64,
}

impl InMemoryBitmapStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            failure: RwLock::new(None),
            commands: AtomicU64::new(0),
        }
    }

    /// Make every subsequent command fail with `error`
    pub fn fail_with(&self, error: StoreError) {
        *self.failure.write() = Some(error);
    }

    /// Stop injecting failures
    pub fn recover(&self) {
        *self.failure.write() = None;
    }

    /// Number of commands received so far
    pub fn commands_executed(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    /// Raw bytes stored under `key`
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.values.read().get(key).cloned()
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    fn begin(&self) -> Result<(), StoreError> {
        self.commands.fetch_add(1, Ordering::Relaxed);
        match &*self.failure.read() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryBitmapStore {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn mask(offset: u32) -> u8 {
    0x80 >> (offset % 8)
}

fn read_bit(bytes: &[u8], offset: u32) -> bool {
    bytes
        .get((offset / 8) as usize)
        .is_some_and(|b| b & mask(offset) != 0)
}

#[async_trait]
impl BitmapStore for InMemoryBitmapStore {
    fn store_id(&self) -> &str {
        "in-memory-bitmap-v1"
    }

    async fn set_bit(&self, key: &str, offset: u32, value: bool) -> Result<bool, StoreError> {
        self.begin()?;

        let mut values = self.values.write();
        let bytes = values.entry(key.to_string()).or_default();
        let idx = (offset / 8) as usize;
        if bytes.len() <= idx {
            bytes.resize(idx + 1, 0);
        }

        let previous = bytes[idx] & mask(offset) != 0;
        if value {
            bytes[idx] |= mask(offset);
        } else {
            bytes[idx] &= !mask(offset);
        }
        Ok(previous)
    }

    async fn get_bit(&self, key: &str, offset: u32) -> Result<bool, StoreError> {
        self.begin()?;
        Ok(self
            .values
            .read()
            .get(key)
            .is_some_and(|bytes| read_bit(bytes, offset)))
    }

    async fn bit_count(&self, key: &str) -> Result<u64, StoreError> {
        self.begin()?;
        Ok(self
            .values
            .read()
            .get(key)
            .map(|bytes| bytes.iter().map(|b| u64::from(b.count_ones())).sum::<u64>())
            .unwrap_or(0))
    }

    async fn bitfield_get_unsigned(
        &self,
        key: &str,
        width: u32,
        offset: u32,
    ) -> Result<Option<u64>, StoreError> {
        self.begin()?;
        if width == 0 || width > MAX_UNSIGNED_FIELD_WIDTH {
            return Err(StoreError::CommandFailure(format!(
                "ERR Invalid bitfield type u{}. Use something like i16 u8. \
                 Note that u64 is not supported but i64 is.",
                width
            )));
        }

        let values = self.values.read();
        let Some(bytes) = values.get(key) else {
            return Ok(None);
        };

        let field = (offset..offset.saturating_add(width))
            .fold(0u64, |acc, o| (acc << 1) | u64::from(read_bit(bytes, o)));
        Ok(Some(field))
    }

    async fn bit_position(&self, key: &str, bit: bool) -> Result<i64, StoreError> {
        self.begin()?;
        let values = self.values.read();
        let Some(bytes) = values.get(key) else {
            // Redis: a missing key has no set bits but its first clear bit is 0
            return Ok(if bit { -1 } else { 0 });
        };

        let skip = if bit { 0x00 } else { 0xff };
        match bytes.iter().position(|&b| b != skip) {
            Some(idx) => {
                let byte = if bit { bytes[idx] } else { !bytes[idx] };
                Ok((idx * 8) as i64 + i64::from(byte.leading_zeros()))
            },
            // All bytes match `skip`: no set bit, or first clear bit right after the value
            None if bit => Ok(-1),
            None => Ok((bytes.len() * 8) as i64),
        }
    }
}
