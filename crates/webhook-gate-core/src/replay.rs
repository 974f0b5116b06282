//! Timestamp freshness checks for replay protection.
//!
//! Every payload carries the time the sender created it. A request is only
//! accepted while that timestamp lies inside the window
//! `[now - max_age, now + max_future_skew]`. Timestamps without an explicit
//! offset are never accepted because they cannot be placed on that window
//! unambiguously.
//!
//! The window alone does not deduplicate: an identical request replayed inside
//! it is accepted again unless [`crate::delivery`] duplicate detection is
//! enabled at the gate.

use crate::ValidationError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default payload field carrying the creation timestamp
pub const DEFAULT_TIMESTAMP_FIELD: &str = "created_at";

/// Formats recognised as ISO 8601 timestamps that lack an offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

// ============================================================================
// Policy
// ============================================================================

/// Freshness window applied to payload timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessPolicy {
    /// Oldest accepted timestamp, in seconds before now
    pub max_age_seconds: u64,

    /// Furthest accepted timestamp, in seconds after now
    pub max_future_skew_seconds: u64,
}

impl FreshnessPolicy {
    pub const DEFAULT_MAX_AGE_SECONDS: u64 = 300;
    pub const MIN_MAX_AGE_SECONDS: u64 = 60;
    pub const MAX_MAX_AGE_SECONDS: u64 = 3600;

    pub const DEFAULT_MAX_FUTURE_SKEW_SECONDS: u64 = 30;
    pub const MIN_MAX_FUTURE_SKEW_SECONDS: u64 = 1;
    pub const MAX_MAX_FUTURE_SKEW_SECONDS: u64 = 300;

    /// Create a policy, rejecting values outside the supported ranges
    pub fn new(
        max_age_seconds: u64,
        max_future_skew_seconds: u64,
    ) -> Result<Self, ValidationError> {
        let policy = Self {
            max_age_seconds,
            max_future_skew_seconds,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check both bounds are inside their supported ranges
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range(
            "max_age_seconds",
            self.max_age_seconds,
            Self::MIN_MAX_AGE_SECONDS,
            Self::MAX_MAX_AGE_SECONDS,
        )?;
        check_range(
            "max_future_skew_seconds",
            self.max_future_skew_seconds,
            Self::MIN_MAX_FUTURE_SKEW_SECONDS,
            Self::MAX_MAX_FUTURE_SKEW_SECONDS,
        )
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            max_age_seconds: Self::DEFAULT_MAX_AGE_SECONDS,
            max_future_skew_seconds: Self::DEFAULT_MAX_FUTURE_SKEW_SECONDS,
        }
    }
}

fn check_range(field: &str, actual: u64, min: u64, max: u64) -> Result<(), ValidationError> {
    if (min..=max).contains(&actual) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
            actual,
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Reasons a payload timestamp is not accepted
///
/// `Unparseable` is a payload format problem. The other three variants are
/// freshness failures that the gate reports uniformly as an invalid timestamp
/// while keeping the variant for logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("Timestamp is not ISO 8601: {message}")]
    Unparseable { message: String },

    #[error("Timestamp has no UTC offset")]
    MissingTimezone,

    #[error("Timestamp is {age_seconds}s old (max {max_age_seconds}s)")]
    TooOld {
        age_seconds: i64,
        max_age_seconds: u64,
    },

    #[error("Timestamp is {skew_seconds}s in the future (max {max_future_skew_seconds}s)")]
    TooFarInFuture {
        skew_seconds: i64,
        max_future_skew_seconds: u64,
    },
}

impl TimestampError {
    /// True for format problems that should be reported as a malformed payload
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Unparseable { .. })
    }

    /// Short machine-readable label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unparseable { .. } => "unparseable",
            Self::MissingTimezone => "missing_timezone",
            Self::TooOld { .. } => "too_old",
            Self::TooFarInFuture { .. } => "too_far_in_future",
        }
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Parse an ISO 8601 timestamp that must carry an explicit offset
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed);
    }

    // ISO 8601 also allows offsets without a colon, e.g. `+0000`.
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(parsed);
    }

    if NAIVE_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(raw, format).is_ok())
    {
        return Err(TimestampError::MissingTimezone);
    }

    Err(TimestampError::Unparseable {
        message: format!("'{}' is not an RFC 3339 timestamp", truncate(raw, 64)),
    })
}

/// Check an offset-aware timestamp against the freshness window
///
/// Bounds are inclusive: a timestamp exactly `max_age_seconds` old is still
/// accepted.
pub fn check_freshness(
    created_at: DateTime<FixedOffset>,
    now: DateTime<Utc>,
    policy: &FreshnessPolicy,
) -> Result<DateTime<Utc>, TimestampError> {
    let created_at = created_at.with_timezone(&Utc);
    let age_ms = (now - created_at).num_milliseconds();

    let max_age_ms = policy.max_age_seconds.saturating_mul(1000) as i64;
    if age_ms > max_age_ms {
        return Err(TimestampError::TooOld {
            age_seconds: age_ms / 1000,
            max_age_seconds: policy.max_age_seconds,
        });
    }

    let max_skew_ms = policy.max_future_skew_seconds.saturating_mul(1000) as i64;
    if -age_ms > max_skew_ms {
        return Err(TimestampError::TooFarInFuture {
            skew_seconds: -age_ms / 1000,
            max_future_skew_seconds: policy.max_future_skew_seconds,
        });
    }

    Ok(created_at)
}

/// Parse `raw` and check it against the freshness window
///
/// # Examples
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use webhook_gate_core::replay::{validate_timestamp, FreshnessPolicy, TimestampError};
///
/// let now = Utc.with_ymd_and_hms(2025, 11, 3, 8, 45, 0).unwrap();
/// let policy = FreshnessPolicy::default();
///
/// assert!(validate_timestamp("2025-11-03T08:43:40Z", now, &policy).is_ok());
/// assert_eq!(
///     validate_timestamp("2025-11-03T08:43:40", now, &policy),
///     Err(TimestampError::MissingTimezone)
/// );
/// ```
pub fn validate_timestamp(
    raw: &str,
    now: DateTime<Utc>,
    policy: &FreshnessPolicy,
) -> Result<DateTime<Utc>, TimestampError> {
    let created_at = parse_timestamp(raw)?;
    check_freshness(created_at, now, policy)
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
