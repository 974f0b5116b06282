//! # Tenant Directory
//!
//! Lookup of per-tenant signing secrets, active flags and rate-limit overrides.
//!
//! The directory is owned by the tenant-configuration system; the gate only
//! borrows a record for the duration of one validation pass. Implementations
//! live in [`crate::adapters`].

use crate::rate_limit::RateLimitPolicy;
use crate::{EndpointId, TenantId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Secret Container
// ============================================================================

/// Tenant signing secret
///
/// # Security
/// - Bytes are zeroed when the value is dropped
/// - `Debug` output never includes the secret
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretValue {
    inner: Vec<u8>,
}

impl SecretValue {
    /// Create secret value from string
    pub fn from_string(mut value: String) -> Self {
        let inner = value.as_bytes().to_vec();
        value.zeroize();
        Self { inner }
    }

    /// Create secret value from bytes
    pub fn from_bytes(value: Vec<u8>) -> Self {
        Self { inner: value }
    }

    /// Get secret as bytes (only for immediate use)
    pub fn expose_bytes(&self) -> &[u8] {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("length", &self.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Tenant Records
// ============================================================================

/// Everything the gate needs to know about one tenant
#[derive(Debug, Clone)]
pub struct TenantRecord {
    pub tenant_id: TenantId,

    /// HMAC key shared with the tenant's webhook sender
    pub secret: SecretValue,

    /// Inactive tenants are rejected before signature verification
    pub active: bool,

    /// Per-endpoint overrides of the default rate-limit policy
    pub rate_limits: HashMap<EndpointId, RateLimitPolicy>,
}

impl TenantRecord {
    /// Active tenant with no rate-limit overrides
    pub fn new(tenant_id: TenantId, secret: SecretValue) -> Self {
        Self {
            tenant_id,
            secret,
            active: true,
            rate_limits: HashMap::new(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_rate_limit(mut self, endpoint: EndpointId, policy: RateLimitPolicy) -> Self {
        self.rate_limits.insert(endpoint, policy);
        self
    }

    /// Policy for `endpoint`, falling back to `default`
    pub fn rate_limit_for(
        &self,
        endpoint: &EndpointId,
        default: RateLimitPolicy,
    ) -> RateLimitPolicy {
        self.rate_limits.get(endpoint).copied().unwrap_or(default)
    }
}

// ============================================================================
// Directory Interface
// ============================================================================

/// Tenant lookup errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("Tenant not found: {tenant_id}")]
    NotFound { tenant_id: String },

    #[error("Tenant directory unavailable: {message}")]
    Unavailable { message: String },
}

impl DirectoryError {
    /// Check if error is transient and should be retried by the caller
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Source of tenant records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Fetch the record for `tenant_id`
    ///
    /// Inactive tenants are returned with `active == false`, not as
    /// [`DirectoryError::NotFound`].
    async fn lookup(&self, tenant_id: &TenantId) -> Result<TenantRecord, DirectoryError>;
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
