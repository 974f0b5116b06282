//! # Webhook Gate Core
//!
//! Core validation chain for the multi-tenant webhook ingestion gate.
//!
//! Every inbound webhook passes through a fixed sequence of checks before it is
//! handed to the processing pipeline:
//!
//! 1. [`tenant`]: extract and syntactically validate the claimed tenant id
//! 2. [`directory`]: look up the tenant's secret and active flag
//! 3. [`signature`]: verify the HMAC-SHA256 signature over the raw body
//! 4. [`replay`]: check the embedded timestamp for freshness
//! 5. [`rate_limit`]: sliding-window quota per tenant and endpoint
//!
//! The [`gate::WebhookGate`] sequences these checks and short-circuits on the
//! first failure.
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations are injected at runtime
//! - In-memory adapters live in [`adapters`]; the shared Redis window store is
//!   behind the `redis` feature
//!
//! ## Usage
//!
//! ```rust
//! use webhook_gate_core::{EndpointId, TenantId};
//!
//! let tenant = TenantId::new("acme-corp").unwrap();
//! let endpoint = EndpointId::new("tickets").unwrap();
//! assert_eq!(tenant.as_str(), "acme-corp");
//! assert_eq!(endpoint.as_str(), "tickets");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

pub mod adapters;
pub mod clock;
pub mod delivery;
pub mod directory;
pub mod gate;
pub mod monitoring;
pub mod rate_limit;
pub mod replay;
pub mod signature;
pub mod tenant;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{
    AuthenticatedTenant, GateConfig, GateStage, Rejection, RejectionReason, ValidationOutcome,
    WebhookGate, WebhookRequest,
};
pub use rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimiter};
pub use replay::FreshnessPolicy;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// Domain Identifier Types
// ============================================================================

static TENANT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("tenant id pattern is a valid regex"));

/// Identifier of a tenant as claimed by a webhook payload
///
/// Format: one or more of lowercase ASCII letters, digits and `-`.
/// A `TenantId` on its own carries no proof of authenticity; see
/// [`gate::AuthenticatedTenant`] for the post-verification form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Create new tenant ID with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "tenant_id".to_string(),
            });
        }

        if !TENANT_ID_PATTERN.is_match(&value) {
            return Err(ValidationError::InvalidCharacters {
                field: "tenant_id".to_string(),
                invalid_chars: "only lowercase letters, digits and '-' are allowed".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

/// Name of the ingestion endpoint a webhook was posted to
///
/// Rate-limit windows are keyed by `(TenantId, EndpointId)`. Endpoint names
/// are path segments, so they are restricted to ASCII alphanumerics plus
/// `-`, `_` and `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointId(String);

impl EndpointId {
    /// Maximum accepted length for endpoint names
    pub const MAX_LENGTH: usize = 64;

    /// Create new endpoint ID with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "endpoint".to_string(),
            });
        }

        if value.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "endpoint".to_string(),
                max_length: Self::MAX_LENGTH,
            });
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ValidationError::InvalidCharacters {
                field: "endpoint".to_string(),
                invalid_chars: "only ASCII letters, digits, '-', '_' and '.' are allowed"
                    .to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EndpointId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EndpointId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EndpointId> for String {
    fn from(value: EndpointId) -> Self {
        value.0
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for input and configuration validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: u64,
        max: u64,
        actual: u64,
    },
}
