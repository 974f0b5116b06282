//! # In-Memory Tenant Directory
//!
//! Thread-safe in-memory [`TenantDirectory`] for testing, development and
//! statically configured deployments.

use crate::directory::{DirectoryError, TenantDirectory, TenantRecord};
use crate::TenantId;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// Thread-safe in-memory tenant directory
#[derive(Clone, Default)]
pub struct InMemoryTenantDirectory {
    tenants: Arc<RwLock<HashMap<TenantId, TenantRecord>>>,
}

impl InMemoryTenantDirectory {
    /// Create new empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create directory pre-populated with records
    pub fn with_tenants(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        let tenants = records
            .into_iter()
            .map(|record| (record.tenant_id.clone(), record))
            .collect();
        Self {
            tenants: Arc::new(RwLock::new(tenants)),
        }
    }

    /// Insert or replace a tenant record
    pub fn add_tenant(&self, record: TenantRecord) {
        if let Ok(mut tenants) = self.tenants.write() {
            tenants.insert(record.tenant_id.clone(), record);
        }
    }

    pub fn remove_tenant(&self, tenant_id: &TenantId) {
        if let Ok(mut tenants) = self.tenants.write() {
            tenants.remove(tenant_id);
        }
    }

    /// Flip the active flag; returns false if the tenant is unknown
    pub fn set_active(&self, tenant_id: &TenantId, active: bool) -> bool {
        match self.tenants.write() {
            Ok(mut tenants) => match tenants.get_mut(tenant_id) {
                Some(record) => {
                    record.active = active;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tenants.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn lookup(&self, tenant_id: &TenantId) -> Result<TenantRecord, DirectoryError> {
        let tenants = self.tenants.read().map_err(|_| DirectoryError::Unavailable {
            message: "tenant directory lock poisoned".to_string(),
        })?;

        tenants
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                tenant_id: tenant_id.to_string(),
            })
    }
}

#[cfg(test)]
#[path = "memory_directory_tests.rs"]
mod tests;
