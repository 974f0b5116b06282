//! Read-through cache in front of a slower [`TenantDirectory`].
//!
//! Records are held for a bounded TTL. When the inner directory is unavailable
//! a recently expired record may still be served for a configured grace period
//! (zero by default). Records older than `ttl + stale_grace` are purged from
//! memory on every refresh and, at most once per TTL, on lookup.
//! `NotFound` answers are never cached.

use crate::directory::{DirectoryError, TenantDirectory, TenantRecord};
use crate::TenantId;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Cache sizing and expiry
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    /// How long a record is served without consulting the inner directory
    pub ttl: Duration,

    /// Extra time an expired record may be served while the inner directory is
    /// unavailable
    pub stale_grace: Duration,

    /// Upper bound on cached tenants
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            stale_grace: Duration::ZERO,
            max_entries: 10_000,
        }
    }
}

#[derive(Clone)]
struct CachedRecord {
    record: TenantRecord,
    cached_at: Instant,
}

/// Tenant directory with a bounded in-memory cache
#[derive(Clone)]
pub struct CachingTenantDirectory {
    inner: Arc<dyn TenantDirectory>,
    settings: CacheSettings,
    entries: Arc<RwLock<HashMap<TenantId, CachedRecord>>>,
    last_purge: Arc<Mutex<Instant>>,
}

impl CachingTenantDirectory {
    pub fn new(inner: Arc<dyn TenantDirectory>, settings: CacheSettings) -> Self {
        Self {
            inner,
            settings,
            entries: Arc::new(RwLock::new(HashMap::new())),
            last_purge: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Age after which a record can no longer be served, even as stale
    fn horizon(&self) -> Duration {
        self.settings.ttl + self.settings.stale_grace
    }

    /// Drop every record past the horizon, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let purged = purge(&mut entries, self.horizon());
        if purged > 0 {
            debug!(purged, remaining = entries.len(), "Purged expired tenant records");
        }
        purged
    }

    /// Purge if at least one TTL has passed since the last purge
    fn purge_if_due(&self) {
        let due = match self.last_purge.lock() {
            Ok(mut last) if last.elapsed() >= self.settings.ttl => {
                *last = Instant::now();
                true
            }
            _ => false,
        };
        if due {
            self.purge_expired();
        }
    }

    /// Drop the cached record for `tenant_id`, forcing the next lookup through
    pub fn invalidate(&self, tenant_id: &TenantId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(tenant_id);
        }
    }

    pub fn cached_len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    fn cached(&self, tenant_id: &TenantId) -> Option<CachedRecord> {
        self.entries.read().ok()?.get(tenant_id).cloned()
    }

    fn store(&self, record: TenantRecord) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        purge(&mut entries, self.horizon());

        if entries.len() >= self.settings.max_entries && !entries.contains_key(&record.tenant_id) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, cached)| cached.cached_at)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            record.tenant_id.clone(),
            CachedRecord {
                record,
                cached_at: Instant::now(),
            },
        );
    }
}

#[async_trait]
impl TenantDirectory for CachingTenantDirectory {
    async fn lookup(&self, tenant_id: &TenantId) -> Result<TenantRecord, DirectoryError> {
        self.purge_if_due();
        let cached = self.cached(tenant_id);

        if let Some(ref cached) = cached {
            if cached.cached_at.elapsed() <= self.settings.ttl {
                debug!(tenant_id = %tenant_id, "Tenant record served from cache");
                return Ok(cached.record.clone());
            }
        }

        match self.inner.lookup(tenant_id).await {
            Ok(record) => {
                self.store(record.clone());
                Ok(record)
            }
            Err(DirectoryError::NotFound { tenant_id: id }) => {
                self.invalidate(tenant_id);
                Err(DirectoryError::NotFound { tenant_id: id })
            }
            Err(err) => {
                let horizon = self.horizon();
                match cached {
                    Some(cached) if cached.cached_at.elapsed() <= horizon => {
                        warn!(
                            tenant_id = %tenant_id,
                            error = %err,
                            "Tenant directory unavailable, serving stale cached record"
                        );
                        Ok(cached.record)
                    }
                    _ => Err(err),
                }
            }
        }
    }
}

fn purge(entries: &mut HashMap<TenantId, CachedRecord>, horizon: Duration) -> usize {
    let before = entries.len();
    entries.retain(|_, cached| cached.cached_at.elapsed() <= horizon);
    before - entries.len()
}

#[cfg(test)]
#[path = "caching_directory_tests.rs"]
mod tests;
