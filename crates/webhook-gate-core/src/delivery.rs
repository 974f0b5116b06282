//! Duplicate-delivery detection.
//!
//! The freshness window bounds how long a captured request stays replayable
//! but does not stop a replay inside it. When enabled at the gate, every
//! authenticated request claims a fingerprint of its body for the length of the
//! freshness window, and a second claim of the same fingerprint is refused.

use crate::rate_limit::StoreError;
use crate::TenantId;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Identity of one delivered payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryKey {
    pub tenant_id: TenantId,

    /// Hex SHA-256 of the raw body
    pub fingerprint: String,
}

impl DeliveryKey {
    pub fn from_body(tenant_id: TenantId, body: &[u8]) -> Self {
        Self {
            tenant_id,
            fingerprint: hex::encode(Sha256::digest(body)),
        }
    }
}

/// Short-lived record of recently admitted deliveries
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryCache: Send + Sync {
    /// Claim `key` until `now_ms + ttl_ms`
    ///
    /// Returns `false` if an unexpired claim already exists.
    async fn try_claim(&self, key: &DeliveryKey, now_ms: i64, ttl_ms: i64)
        -> Result<bool, StoreError>;

    /// Give up a claim, e.g. when a later check rejected the request
    async fn release(&self, key: &DeliveryKey) -> Result<(), StoreError>;
}
