//! # Sliding-Window Rate Limiting
//!
//! Admission control keyed by `(tenant, endpoint)`.
//!
//! Each key owns an ordered collection of [`SlidingWindowEntry`] values scored
//! by their admission time in milliseconds. A check:
//!
//! 1. removes entries older than `now - window`
//! 2. counts what is left
//! 3. records a new uniquely-tokened entry if the count is below the limit
//!
//! Steps 1-3 run as one atomic operation per key inside the [`WindowStore`],
//! so concurrent bursts against the same key cannot over-admit. Keys never
//! contend with each other.
//!
//! When a request is rejected, the retry hint is the time until the oldest
//! entry leaves the window, rounded up to whole seconds and never below one.

use crate::clock::{Clock, SystemClock};
use crate::{EndpointId, TenantId, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// ============================================================================
// Policy and Keys
// ============================================================================

/// Request quota for one tenant/endpoint pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitPolicy {
    /// Maximum admitted requests per window
    pub limit: u32,

    /// Window length in seconds
    pub window_seconds: u64,
}

impl RateLimitPolicy {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const DEFAULT_WINDOW_SECONDS: u64 = 60;

    /// Create a policy with validation
    pub fn new(limit: u32, window_seconds: u64) -> Result<Self, ValidationError> {
        let policy = Self {
            limit,
            window_seconds,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == 0 {
            return Err(ValidationError::OutOfRange {
                field: "limit".to_string(),
                min: 1,
                max: u64::from(u32::MAX),
                actual: 0,
            });
        }
        if self.window_seconds == 0 {
            return Err(ValidationError::OutOfRange {
                field: "window_seconds".to_string(),
                min: 1,
                max: u64::MAX,
                actual: 0,
            });
        }
        Ok(())
    }

    /// Window length in milliseconds
    pub fn window_millis(&self) -> i64 {
        i64::try_from(self.window_seconds.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            window_seconds: Self::DEFAULT_WINDOW_SECONDS,
        }
    }
}

/// Identity of one sliding window
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub tenant_id: TenantId,
    pub endpoint: EndpointId,
}

impl WindowKey {
    pub fn new(tenant_id: TenantId, endpoint: EndpointId) -> Self {
        Self {
            tenant_id,
            endpoint,
        }
    }

    /// Key under which shared stores keep this window
    ///
    /// Neither component can contain `:`, so the encoding is unambiguous.
    pub fn storage_key(&self) -> String {
        format!("webhook-gate:ratelimit:{}:{}", self.tenant_id, self.endpoint)
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.endpoint)
    }
}

/// One admitted request inside a window
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlidingWindowEntry {
    /// Admission time, milliseconds since the UNIX epoch
    pub timestamp_ms: i64,

    /// Unique token so simultaneous admissions do not collapse
    pub token: String,
}

impl SlidingWindowEntry {
    /// Create an entry with a fresh random token
    pub fn new(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            token: format!("{}-{}", timestamp_ms, uuid::Uuid::new_v4()),
        }
    }
}

// ============================================================================
// Store Abstraction
// ============================================================================

/// Result of one atomic check against a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCheck {
    /// Whether the entry was recorded
    pub admitted: bool,

    /// Entries in the window after the operation
    pub count: u64,

    /// Score of the oldest entry remaining in the window
    pub oldest_ms: Option<i64>,
}

/// Failures of the backing time-series store
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Window store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Window store operation failed: {message}")]
    Backend { message: String },
}

/// Ordered time-series store holding one window per key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Atomically purge expired entries, count, and record `entry` if the
    /// count is below `limit`
    ///
    /// Entries with a score strictly below `entry.timestamp_ms - window_ms`
    /// are expired.
    async fn check_and_record(
        &self,
        key: &WindowKey,
        entry: SlidingWindowEntry,
        window_ms: i64,
        limit: u64,
    ) -> Result<WindowCheck, StoreError>;

    /// Purge expired entries and return how many remain, without recording
    async fn window_size(
        &self,
        key: &WindowKey,
        now_ms: i64,
        window_ms: i64,
    ) -> Result<u64, StoreError>;

    /// Drop every entry for `key`
    async fn reset(&self, key: &WindowKey) -> Result<(), StoreError>;
}

// ============================================================================
// Rate Limiter
// ============================================================================

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Admitted { remaining: u64 },
    Rejected { retry_after_seconds: u64 },
}

impl RateLimitDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimitError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sliding-window limiter over a [`WindowStore`]
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn WindowStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Check and record one request at the current clock time
    pub async fn check_and_record(
        &self,
        tenant_id: &TenantId,
        endpoint: &EndpointId,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let now_ms = self.clock.now_millis();
        self.check_and_record_at(tenant_id, endpoint, policy, now_ms)
            .await
    }

    /// Check and record one request at an explicit time
    ///
    /// The gate uses this so the freshness check and the limiter share one
    /// reading of the clock.
    #[instrument(
        skip(self, policy),
        fields(limit = policy.limit, window_seconds = policy.window_seconds)
    )]
    pub async fn check_and_record_at(
        &self,
        tenant_id: &TenantId,
        endpoint: &EndpointId,
        policy: &RateLimitPolicy,
        now_ms: i64,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let key = WindowKey::new(tenant_id.clone(), endpoint.clone());
        let window_ms = policy.window_millis();
        let limit = u64::from(policy.limit);

        let check = self
            .store
            .check_and_record(&key, SlidingWindowEntry::new(now_ms), window_ms, limit)
            .await?;

        if check.admitted {
            let remaining = limit.saturating_sub(check.count);
            debug!(key = %key, count = check.count, remaining, "Request within rate limit");
            return Ok(RateLimitDecision::Admitted { remaining });
        }

        let retry_after_seconds = retry_after_seconds(check.oldest_ms, window_ms, now_ms);
        debug!(key = %key, count = check.count, retry_after_seconds, "Rate limit reached");
        Ok(RateLimitDecision::Rejected {
            retry_after_seconds,
        })
    }

    /// Number of entries currently inside the window for `tenant_id/endpoint`
    pub async fn current_usage(
        &self,
        tenant_id: &TenantId,
        endpoint: &EndpointId,
        policy: &RateLimitPolicy,
    ) -> Result<u64, RateLimitError> {
        let key = WindowKey::new(tenant_id.clone(), endpoint.clone());
        Ok(self
            .store
            .window_size(&key, self.clock.now_millis(), policy.window_millis())
            .await?)
    }

    /// Clear the whole window for `tenant_id/endpoint`
    #[instrument(skip(self))]
    pub async fn reset(
        &self,
        tenant_id: &TenantId,
        endpoint: &EndpointId,
    ) -> Result<(), RateLimitError> {
        let key = WindowKey::new(tenant_id.clone(), endpoint.clone());
        self.store.reset(&key).await?;
        Ok(())
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Seconds until the oldest entry leaves the window, at least one
pub fn retry_after_seconds(oldest_ms: Option<i64>, window_ms: i64, now_ms: i64) -> u64 {
    let Some(oldest_ms) = oldest_ms else {
        return 1;
    };
    let wait_ms = oldest_ms.saturating_add(window_ms).saturating_sub(now_ms);
    if wait_ms <= 0 {
        return 1;
    }
    let seconds = (wait_ms as u64).div_ceil(1000);
    seconds.max(1)
}
