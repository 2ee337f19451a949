//! Core trait definitions for pluggable bitmap stores

use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;

// =============================================================================
// BitmapStore Trait
// =============================================================================

/// Bit-level primitives over string values in a key-value store
///
/// Offsets are 0-based and follow Redis bit numbering: offset 0 is the most
/// significant bit of the first byte. A missing key reads as all zero bits.
/// Implementations report failures and never substitute defaults for them.
#[async_trait]
pub trait BitmapStore: Send + Sync + 'static {
    /// Unique identifier for this store backend
    fn store_id(&self) -> &str;

    /// Set the bit at `offset` to `value`, returning its previous value
    async fn set_bit(&self, key: &str, offset: u32, value: bool) -> Result<bool, StoreError>;

    /// Read the bit at `offset`
    async fn get_bit(&self, key: &str, offset: u32) -> Result<bool, StoreError>;

    /// Number of set bits in the whole value
    async fn bit_count(&self, key: &str) -> Result<u64, StoreError>;

    /// Read `width` bits starting at `offset` as an unsigned integer
    ///
    /// The bit at `offset` becomes the most significant bit of the result.
    /// `None` means the store had nothing to return for the field.
    async fn bitfield_get_unsigned(
        &self,
        key: &str,
        width: u32,
        offset: u32,
    ) -> Result<Option<u64>, StoreError>;

    /// Offset of the first bit equal to `bit`, or a negative value if none
    async fn bit_position(&self, key: &str, bit: bool) -> Result<i64, StoreError>;
}

#[async_trait]
impl<S: BitmapStore + ?Sized> BitmapStore for Arc<S> {
    fn store_id(&self) -> &str {
        (**self).store_id()
    }

    async fn set_bit(&self, key: &str, offset: u32, value: bool) -> Result<bool, StoreError> {
        (**self).set_bit(key, offset, value).await
    }

    async fn get_bit(&self, key: &str, offset: u32) -> Result<bool, StoreError> {
        (**self).get_bit(key, offset).await
    }

    async fn bit_count(&self, key: &str) -> Result<u64, StoreError> {
        (**self).bit_count(key).await
    }

    async fn bitfield_get_unsigned(
        &self,
        key: &str,
        width: u32,
        offset: u32,
    ) -> Result<Option<u64>, StoreError> {
        (**self).bitfield_get_unsigned(key, width, offset).await
    }

    async fn bit_position(&self, key: &str, bit: bool) -> Result<i64, StoreError> {
        (**self).bit_position(key, bit).await
    }
}
