//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use webhook_gate_core::{
    directory::{SecretValue, TenantRecord},
    EndpointId, GateConfig, RateLimitPolicy, TenantId,
};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Validation chain settings
    pub gate: GateConfig,

    /// Policy for endpoints without a tenant-specific override
    pub rate_limits: RateLimitPolicy,

    /// Statically configured tenants
    pub tenants: Vec<TenantConfig>,

    /// How long a directory record may be served from cache
    pub tenant_cache_ttl_seconds: u64,

    /// Extra time an expired record may be served while the directory is down
    pub tenant_cache_stale_grace_seconds: u64,

    /// Rate-limit window store
    pub store: StoreConfig,

    /// Administrative API
    pub admin: AdminConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            gate: GateConfig::default(),
            rate_limits: RateLimitPolicy::default(),
            tenants: Vec::new(),
            tenant_cache_ttl_seconds: 60,
            tenant_cache_stale_grace_seconds: 0,
            store: StoreConfig::default(),
            admin: AdminConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Validate every section
    ///
    /// Called once at startup; a failure aborts the service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;

        // The service-wide default lives in `rate_limits`; the gate copy is overwritten.
        if self.gate.default_rate_limit != RateLimitPolicy::default()
            && self.gate.default_rate_limit != self.rate_limits
        {
            return Err(ConfigError::Invalid {
                message: "gate.default_rate_limit is not used by the service; \
                          set the default policy under rate_limits"
                    .to_string(),
            });
        }

        self.effective_gate_config()
            .validate()
            .map_err(|source| ConfigError::Validation {
                section: "gate".to_string(),
                source,
            })?;

        if self.tenant_cache_ttl_seconds > 3600 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "tenant_cache_ttl_seconds must be at most 3600, got {}",
                    self.tenant_cache_ttl_seconds
                ),
            });
        }
        if self.tenant_cache_stale_grace_seconds > 3600 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "tenant_cache_stale_grace_seconds must be at most 3600, got {}",
                    self.tenant_cache_stale_grace_seconds
                ),
            });
        }
        if self.tenant_cache_ttl_seconds == 0 && self.tenant_cache_stale_grace_seconds > 0 {
            return Err(ConfigError::Invalid {
                message: "tenant_cache_stale_grace_seconds requires a tenant cache TTL".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for tenant in &self.tenants {
            tenant.to_record()?;
            if !seen.insert(tenant.tenant_id.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!("tenant '{}' is configured more than once", tenant.tenant_id),
                });
            }
        }

        self.store.validate()?;
        self.admin.validate()
    }

    /// Gate settings with the service-wide default rate limit applied
    pub fn effective_gate_config(&self) -> GateConfig {
        GateConfig {
            default_rate_limit: self.rate_limits,
            ..self.gate.clone()
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "server.host".to_string(),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "server.timeout_seconds must be greater than zero".to_string(),
            });
        }
        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A tenant defined directly in configuration
///
/// Intended for development and small deployments. The secret is held in
/// plain configuration, so the service warns at startup when any are present.
#[derive(Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,

    pub secret: String,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Per-endpoint overrides of the default policy
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimitPolicy>,
}

fn default_active() -> bool {
    true
}

impl TenantConfig {
    /// Convert into a directory record, validating ids and policies
    pub fn to_record(&self) -> Result<TenantRecord, ConfigError> {
        let tenant_id =
            TenantId::new(self.tenant_id.clone()).map_err(|source| ConfigError::Validation {
                section: format!("tenants[{}]", self.tenant_id),
                source,
            })?;

        if self.secret.is_empty() {
            return Err(ConfigError::Missing {
                key: format!("tenants[{}].secret", self.tenant_id),
            });
        }

        let mut record =
            TenantRecord::new(tenant_id, SecretValue::from_string(self.secret.clone()));
        if !self.active {
            record = record.inactive();
        }

        for (endpoint, policy) in &self.rate_limits {
            let section = format!("tenants[{}].rate_limits[{}]", self.tenant_id, endpoint);
            let endpoint = EndpointId::new(endpoint.clone()).map_err(|source| {
                ConfigError::Validation {
                    section: section.clone(),
                    source,
                }
            })?;
            policy
                .validate()
                .map_err(|source| ConfigError::Validation { section, source })?;
            record = record.with_rate_limit(endpoint, *policy);
        }

        Ok(record)
    }
}

impl fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConfig")
            .field("tenant_id", &self.tenant_id)
            .field("secret", &"[REDACTED]")
            .field("active", &self.active)
            .field("rate_limits", &self.rate_limits)
            .finish()
    }
}

/// Which backend holds the rate-limit windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local; quota is not shared between instances
    #[default]
    Memory,

    /// Shared Redis sorted sets
    Redis,
}

/// Rate-limit store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Connection URL, required for the Redis backend
    pub redis_url: Option<String>,

    /// How often idle in-memory windows are evicted
    pub eviction_interval_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: None,
            eviction_interval_seconds: 300,
        }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            StoreBackend::Memory if self.eviction_interval_seconds == 0 => {
                Err(ConfigError::Invalid {
                    message: "store.eviction_interval_seconds must be greater than zero"
                        .to_string(),
                })
            }
            StoreBackend::Redis
                if self
                    .redis_url
                    .as_deref()
                    .map_or(true, |url| url.trim().is_empty()) =>
            {
                Err(ConfigError::Missing {
                    key: "store.redis_url".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Administrative API configuration
///
/// The admin routes are mounted only when a token is configured.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required on every admin request
    pub token: Option<String>,
}

impl AdminConfig {
    pub const MIN_TOKEN_LENGTH: usize = 16;

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match &self.token {
            Some(token) if token.len() < Self::MIN_TOKEN_LENGTH => Err(ConfigError::Invalid {
                message: format!(
                    "admin.token must be at least {} characters",
                    Self::MIN_TOKEN_LENGTH
                ),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}
