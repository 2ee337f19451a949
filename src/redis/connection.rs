//! Redis connection pool with per-command timeouts
//!
//! One multiplexed connection is shared by every caller. A semaphore caps the
//! number of commands in flight, each command runs under
//! [`RedisConfig::command_timeout`], and a dropped connection is re-opened on
//! the next command. Retries are off unless [`RetryPolicy::max_retries`] is
//! raised, so by default every store operation is exactly one round trip.
//!
//! # Example
//!
//! ```rust,no_run
//! use kuba_attendance::redis::{RedisConfig, RedisPool};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RedisConfig::with_url("redis://localhost:6379")
//!     .pool_size(8)
//!     .command_timeout(Duration::from_millis(500));
//!
//! let pool = RedisPool::new(config).await?;
//! let pong: String = pool
//!     .execute(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::StoreError;
use parking_lot::RwLock;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::util::safe_redis_error;

/// Upper bound for [`RedisConfig::pool_size`]
pub const MAX_POOL_SIZE: u32 = 1000;

/// Connection settings for [`RedisPool`]
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// `redis://` or `rediss://` URL
    pub url: String,
    /// Commands allowed in flight at once
    pub pool_size: u32,
    /// Limit for opening a connection
    pub connection_timeout: Duration,
    /// Limit for a single command round trip
    pub command_timeout: Duration,
    /// Retries after transport failures
    pub retry: RetryPolicy,
    /// Connect over TLS (needs the `redis-tls` feature)
    pub tls: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 16,
            connection_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(1),
            retry: RetryPolicy::none(),
            tls: false,
        }
    }
}

impl RedisConfig {
    /// Default settings against `url`
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the in-flight command limit
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the connect timeout
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the per-command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Enable or disable TLS
    pub fn tls(mut self, enabled: bool) -> Self {
        self.tls = enabled;
        self
    }

    /// Check the settings before connecting
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("url must not be empty".to_string());
        }
        if !(1..=MAX_POOL_SIZE).contains(&self.pool_size) {
            return Err(format!("pool_size must be within 1..={}", MAX_POOL_SIZE));
        }
        if self.connection_timeout.is_zero() || self.command_timeout.is_zero() {
            return Err("timeouts must be greater than 0".to_string());
        }

        match (self.tls, self.url.starts_with("rediss://")) {
            (true, false) => return Err("tls requires a rediss:// url".to_string()),
            (false, true) => return Err("rediss:// url requires tls = true".to_string()),
            _ => {},
        }
        if self.tls && !cfg!(feature = "redis-tls") {
            return Err("tls requires the redis-tls feature".to_string());
        }

        Ok(())
    }
}

/// How often and how patiently a failed command is retried
///
/// Only transport failures (timeouts, dropped or refused connections) are
/// retried. The wait doubles after every retry, starting at `backoff`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait before the first retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Never retry
    pub const fn none() -> Self {
        Self::new(0)
    }

    /// Retry up to `max_retries` times with a 50ms initial backoff
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Duration::from_millis(50),
        }
    }

    /// Set the initial backoff
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Wait before retry number `retry` (0-based)
    fn delay(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(1 << retry.min(6))
    }
}

#[derive(Debug, Default)]
struct PoolMetrics {
    connections: AtomicU64,
    commands: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    retries: AtomicU64,
}

/// Counters of a [`RedisPool`] at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMetricsSnapshot {
    /// Connections opened, including reconnects
    pub connections: u64,
    /// Commands answered successfully
    pub commands: u64,
    /// Failed attempts, timeouts included
    pub failures: u64,
    /// Attempts that hit the command timeout
    pub timeouts: u64,
    /// Retries issued
    pub retries: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Redis connection pool
pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    config: RedisConfig,
    metrics: PoolMetrics,
    permits: Semaphore,
}

impl RedisPool {
    /// Validate `config`, connect, and create the pool
    pub async fn new(config: RedisConfig) -> Result<Self, StoreError> {
        config.validate().map_err(StoreError::Unavailable)?;

        let client = Client::open(config.url.as_str())
            .map_err(|e| StoreError::Unavailable(safe_redis_error(&config.url, &e)))?;

        let pool = Self {
            client,
            connection: RwLock::new(None),
            permits: Semaphore::new(config.pool_size as usize),
            metrics: PoolMetrics::default(),
            config,
        };
        pool.connect().await?;

        debug!(pool_size = pool.config.pool_size, "Redis pool ready");
        Ok(pool)
    }

    async fn connect(&self) -> Result<MultiplexedConnection, StoreError> {
        let opened = tokio::time::timeout(
            self.config.connection_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await;

        let conn = match opened {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                return Err(StoreError::Unavailable(safe_redis_error(&self.config.url, &e)))
            },
            Err(_) => return Err(StoreError::Unavailable("Connection timeout".to_string())),
        };

        *self.connection.write() = Some(conn.clone());
        bump(&self.metrics.connections);
        debug!("Redis connection opened");
        Ok(conn)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let existing = self.connection.read().clone();
        match existing {
            Some(conn) => Ok(conn),
            None => self.connect().await,
        }
    }

    /// One attempt; the flag tells whether the failure may be retried
    async fn attempt<F, Fut, T>(&self, f: &F) -> Result<T, (StoreError, bool)>
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: Future<Output = Result<T, RedisError>>,
    {
        let conn = self.connection().await.map_err(|e| (e, true))?;

        match tokio::time::timeout(self.config.command_timeout, f(conn)).await {
            Ok(Ok(value)) => {
                bump(&self.metrics.commands);
                Ok(value)
            },
            Ok(Err(e)) => {
                bump(&self.metrics.failures);
                if is_connection_error(&e) {
                    *self.connection.write() = None;
                }
                Err((classify_error(&self.config.url, &e), is_retriable_error(&e)))
            },
            Err(_) => {
                bump(&self.metrics.failures);
                bump(&self.metrics.timeouts);
                Err((StoreError::Unavailable("Command timeout".to_string()), true))
            },
        }
    }

    /// Run a command under the pool's timeout and retry policy
    ///
    /// Transport failures map to [`StoreError::Unavailable`], replies the
    /// server rejected to [`StoreError::CommandFailure`].
    pub async fn execute<F, Fut, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: Future<Output = Result<T, RedisError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| StoreError::Unavailable("Pool closed".to_string()))?;

        let policy = self.config.retry;
        let mut retry = 0;
        loop {
            let err = match self.attempt(&f).await {
                Ok(value) => return Ok(value),
                Err((err, true)) if retry < policy.max_retries => err,
                Err((err, _)) => return Err(err),
            };

            let delay = policy.delay(retry);
            bump(&self.metrics.retries);
            warn!(retry = retry + 1, ?delay, error = %err, "Retrying Redis command");
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }

    /// Current counters
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PoolMetricsSnapshot {
            connections: load(&self.metrics.connections),
            commands: load(&self.metrics.commands),
            failures: load(&self.metrics.failures),
            timeouts: load(&self.metrics.timeouts),
            retries: load(&self.metrics.retries),
        }
    }

    /// Settings the pool was created with
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// Map a Redis error onto the store error taxonomy
pub(crate) fn classify_error(url: &str, e: &RedisError) -> StoreError {
    let message = safe_redis_error(url, e);
    if is_connection_error(e) || e.is_timeout() {
        StoreError::Unavailable(message)
    } else {
        StoreError::CommandFailure(message)
    }
}

fn is_retriable_error(e: &RedisError) -> bool {
    is_connection_error(e) || e.is_timeout() || e.kind() == redis::ErrorKind::BusyLoadingError
}

fn is_connection_error(e: &RedisError) -> bool {
    e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error()
}
