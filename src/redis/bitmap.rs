//! Redis implementation of [`BitmapStore`]
//!
//! Each trait method is a single Redis command:
//!
//! ```text
//! set_bit                 SETBIT   <key> <offset> <0|1>
//! get_bit                 GETBIT   <key> <offset>
//! bit_count               BITCOUNT <key>
//! bitfield_get_unsigned   BITFIELD <key> GET u<width> <offset>
//! bit_position            BITPOS   <key> <0|1>
//! ```

use crate::engine::traits::BitmapStore;
use crate::error::StoreError;
use crate::register::MAX_UNSIGNED_FIELD_WIDTH;

use super::connection::{PoolMetricsSnapshot, RedisConfig, RedisPool};

use async_trait::async_trait;
use tracing::debug;

/// Bitmap store backed by Redis string values
pub struct RedisBitmapStore {
    pool: RedisPool,
}

impl RedisBitmapStore {
    /// Connect to Redis and create the store
    pub async fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let pool = RedisPool::new(config).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    /// Get pool metrics
    pub fn pool_metrics(&self) -> PoolMetricsSnapshot {
        self.pool.metrics()
    }
}

#[async_trait]
impl BitmapStore for RedisBitmapStore {
    fn store_id(&self) -> &str {
        "redis-bitmap-v1"
    }

    async fn set_bit(&self, key: &str, offset: u32, value: bool) -> Result<bool, StoreError> {
        debug!(key, offset, value, "SETBIT");
        self.pool
            .execute(|mut conn| async move {
                redis::cmd("SETBIT")
                    .arg(key)
                    .arg(offset)
                    .arg(u8::from(value))
                    .query_async::<bool>(&mut conn)
                    .await
            })
            .await
    }

    async fn get_bit(&self, key: &str, offset: u32) -> Result<bool, StoreError> {
        debug!(key, offset, "GETBIT");
        self.pool
            .execute(|mut conn| async move {
                redis::cmd("GETBIT")
                    .arg(key)
                    .arg(offset)
                    .query_async::<bool>(&mut conn)
                    .await
            })
            .await
    }

    async fn bit_count(&self, key: &str) -> Result<u64, StoreError> {
        debug!(key, "BITCOUNT");
        self.pool
            .execute(|mut conn| async move {
                redis::cmd("BITCOUNT")
                    .arg(key)
                    .query_async::<u64>(&mut conn)
                    .await
            })
            .await
    }

    async fn bitfield_get_unsigned(
        &self,
        key: &str,
        width: u32,
        offset: u32,
    ) -> Result<Option<u64>, StoreError> {
        if width == 0 || width > MAX_UNSIGNED_FIELD_WIDTH {
            return Err(StoreError::CommandFailure(format!(
                "unsigned bit field width {} outside 1..={}",
                width, MAX_UNSIGNED_FIELD_WIDTH
            )));
        }

        debug!(key, width, offset, "BITFIELD GET");
        let encoding = format!("u{}", width);
        let replies = self
            .pool
            .execute(|mut conn| {
                let encoding = encoding.clone();
                async move {
                    redis::cmd("BITFIELD")
                        .arg(key)
                        .arg("GET")
                        .arg(encoding)
                        .arg(offset)
                        .query_async::<Vec<Option<u64>>>(&mut conn)
                        .await
                }
            })
            .await?;

        // One GET sub-command, one reply
        Ok(replies.into_iter().next().flatten())
    }

    async fn bit_position(&self, key: &str, bit: bool) -> Result<i64, StoreError> {
        debug!(key, bit, "BITPOS");
        self.pool
            .execute(|mut conn| async move {
                redis::cmd("BITPOS")
                    .arg(key)
                    .arg(u8::from(bit))
                    .query_async::<i64>(&mut conn)
                    .await
            })
            .await
    }
}
