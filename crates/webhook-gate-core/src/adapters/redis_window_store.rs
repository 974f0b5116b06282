//! # Redis Window Store
//!
//! Shared [`WindowStore`] backed by Redis sorted sets, so several gate
//! instances account against the same quota.
//!
//! Each window is one sorted set whose members are entry tokens scored by
//! admission time. The purge-count-insert sequence runs as a single Lua
//! script, which Redis executes atomically.

use crate::rate_limit::{SlidingWindowEntry, StoreError, WindowCheck, WindowKey, WindowStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::{error, instrument};

/// KEYS[1] window key
/// ARGV[1] now (ms), ARGV[2] window (ms), ARGV[3] limit, ARGV[4] member
///
/// Returns `{admitted, count, oldest_score_or_-1}`.
const CHECK_AND_RECORD_SCRIPT: &str = r#"
    local now = tonumber(ARGV[1])
    local window = tonumber(ARGV[2])
    local limit = tonumber(ARGV[3])

    redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', '(' .. (now - window))
    local count = redis.call('ZCARD', KEYS[1])

    local admitted = 0
    if count < limit then
        redis.call('ZADD', KEYS[1], now, ARGV[4])
        count = count + 1
        admitted = 1
    end
    redis.call('PEXPIRE', KEYS[1], window)

    local oldest = redis.call('ZRANGE', KEYS[1], 0, 0, 'WITHSCORES')
    local oldest_score = -1
    if oldest[2] then
        oldest_score = tonumber(oldest[2])
    end

    return {admitted, count, oldest_score}
"#;

/// Redis-backed sliding-window store
#[derive(Clone)]
pub struct RedisWindowStore {
    connection: ConnectionManager,
    script: Script,
}

impl RedisWindowStore {
    /// Connect to Redis at `url`
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::Unavailable {
            message: e.to_string(),
        })?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable {
                message: e.to_string(),
            })?;
        Ok(Self::from_connection(connection))
    }

    /// Wrap an existing connection manager
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            script: Script::new(CHECK_AND_RECORD_SCRIPT),
        }
    }
}

impl std::fmt::Debug for RedisWindowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisWindowStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    #[instrument(skip(self, key, entry), fields(key = %key))]
    async fn check_and_record(
        &self,
        key: &WindowKey,
        entry: SlidingWindowEntry,
        window_ms: i64,
        limit: u64,
    ) -> Result<WindowCheck, StoreError> {
        let mut connection = self.connection.clone();
        let (admitted, count, oldest): (i64, u64, i64) = self
            .script
            .key(key.storage_key())
            .arg(entry.timestamp_ms)
            .arg(window_ms)
            .arg(limit)
            .arg(entry.token)
            .invoke_async(&mut connection)
            .await
            .map_err(backend_error)?;

        Ok(WindowCheck {
            admitted: admitted == 1,
            count,
            oldest_ms: (oldest >= 0).then_some(oldest),
        })
    }

    async fn window_size(
        &self,
        key: &WindowKey,
        now_ms: i64,
        window_ms: i64,
    ) -> Result<u64, StoreError> {
        let mut connection = self.connection.clone();
        let storage_key = key.storage_key();
        let cutoff = format!("({}", now_ms.saturating_sub(window_ms));

        let (_, count): (u64, u64) = redis::pipe()
            .atomic()
            .zrembyscore(&storage_key, "-inf", cutoff)
            .zcard(&storage_key)
            .query_async(&mut connection)
            .await
            .map_err(backend_error)?;
        Ok(count)
    }

    async fn reset(&self, key: &WindowKey) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: u64 = connection
            .del(key.storage_key())
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

fn backend_error(e: redis::RedisError) -> StoreError {
    error!(error = %e, "Redis window store operation failed");
    if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
        StoreError::Unavailable {
            message: e.to_string(),
        }
    } else {
        StoreError::Backend {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "redis_window_store_tests.rs"]
mod tests;
