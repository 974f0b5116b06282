//! # In-Memory Delivery Cache
//!
//! Process-local [`DeliveryCache`] bounded by entry count. When full it first
//! drops expired claims and otherwise refuses new claims.

use crate::delivery::{DeliveryCache, DeliveryKey};
use crate::rate_limit::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Process-local delivery cache bounded by entry count
#[derive(Clone)]
pub struct InMemoryDeliveryCache {
    claims: Arc<Mutex<HashMap<DeliveryKey, i64>>>,
    max_entries: usize,
}

impl InMemoryDeliveryCache {
    pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            claims: Arc::new(Mutex::new(HashMap::new())),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.claims.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryDeliveryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryCache for InMemoryDeliveryCache {
    async fn try_claim(
        &self,
        key: &DeliveryKey,
        now_ms: i64,
        ttl_ms: i64,
    ) -> Result<bool, StoreError> {
        let mut claims = self.claims.lock().map_err(|_| StoreError::Backend {
            message: "delivery cache lock poisoned".to_string(),
        })?;

        if claims.len() >= self.max_entries {
            claims.retain(|_, expires_at| *expires_at > now_ms);
        }

        if let Some(expires_at) = claims.get(key) {
            if *expires_at > now_ms {
                return Ok(false);
            }
        }

        if claims.len() >= self.max_entries {
            return Err(StoreError::Unavailable {
                message: "delivery cache is full".to_string(),
            });
        }

        claims.insert(key.clone(), now_ms.saturating_add(ttl_ms));
        Ok(true)
    }

    async fn release(&self, key: &DeliveryKey) -> Result<(), StoreError> {
        let mut claims = self.claims.lock().map_err(|_| StoreError::Backend {
            message: "delivery cache lock poisoned".to_string(),
        })?;
        claims.remove(key);
        Ok(())
    }
}
