//! Startup wiring: configuration layering, logging and collaborator construction.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webhook_gate_api::{ConfigError, LoggingConfig, ServiceConfig, StoreBackend, StoreConfig};
use webhook_gate_core::{
    adapters::{CacheSettings, CachingTenantDirectory, InMemoryTenantDirectory, InMemoryWindowStore},
    directory::{TenantDirectory, TenantRecord},
    rate_limit::{StoreError, WindowStore},
    Clock, SystemClock,
};

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;

/// Env var naming an operator-supplied configuration file
pub const CONFIG_FILE_ENV: &str = "WEBHOOK_GATE_CONFIG_FILE";

/// Prefix for configuration overrides, e.g. `WG__SERVER__PORT=9090`
pub const ENV_PREFIX: &str = "WG";

/// Startup failures; all map to exit code 3
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error(transparent)]
    Invalid(#[from] ConfigError),

    #[error("Rate-limit store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("The {backend} store backend is not compiled into this build")]
    UnsupportedBackend { backend: String },
}

/// Load the layered service configuration
///
/// Sources, later overriding earlier:
///  1. `/etc/webhook-gate/service.{yaml,toml,json}`
///  2. `./config/service.{yaml,toml,json}`
///  3. `explicit_path`, which must exist when given
///  4. `WG__`-prefixed environment variables with `__` as the separator
///
/// Every field has a default, so no sources at all yields a valid config.
pub fn load_config(explicit_path: Option<&str>) -> Result<ServiceConfig, StartupError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("/etc/webhook-gate/service").required(false))
        .add_source(config::File::with_name("config/service").required(false));

    if let Some(path) = explicit_path.filter(|p| !p.is_empty()) {
        builder = builder.add_source(config::File::with_name(path).required(true));
        info!(path = %path, "Loading configuration from explicit path");
    }

    let settings = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `logging.level` when set.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &logging.level;
        EnvFilter::new(format!(
            "webhook_gate={level},webhook_gate_api={level},webhook_gate_core={level},\
             tower_http=info"
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Directory records for the statically configured tenants
pub fn tenant_records(config: &ServiceConfig) -> Result<Vec<TenantRecord>, ConfigError> {
    if !config.tenants.is_empty() {
        warn!(
            tenants = config.tenants.len(),
            "Tenant secrets are loaded from plain configuration. \
             Use this for development only."
        );
    }

    config.tenants.iter().map(|tenant| tenant.to_record()).collect()
}

/// Tenant directory over the configured tenants, cached when a TTL is set
pub fn build_directory(config: &ServiceConfig) -> Result<Arc<dyn TenantDirectory>, ConfigError> {
    let records = tenant_records(config)?;
    info!(tenants = records.len(), "Loaded tenant directory");

    let directory: Arc<dyn TenantDirectory> =
        Arc::new(InMemoryTenantDirectory::with_tenants(records));

    if config.tenant_cache_ttl_seconds == 0 {
        return Ok(directory);
    }

    Ok(Arc::new(CachingTenantDirectory::new(
        directory,
        CacheSettings {
            ttl: Duration::from_secs(config.tenant_cache_ttl_seconds),
            stale_grace: Duration::from_secs(config.tenant_cache_stale_grace_seconds),
            ..CacheSettings::default()
        },
    )))
}

/// Longest rate-limit window in use, for idle eviction
pub fn longest_window_millis(config: &ServiceConfig) -> i64 {
    config
        .tenants
        .iter()
        .flat_map(|tenant| tenant.rate_limits.values())
        .chain(std::iter::once(&config.rate_limits))
        .map(|policy| policy.window_millis())
        .max()
        .unwrap_or_default()
}

/// A constructed window store; the in-memory variant needs periodic eviction
pub enum BuiltStore {
    Memory(InMemoryWindowStore),
    #[cfg(feature = "redis")]
    Redis(webhook_gate_core::adapters::RedisWindowStore),
}

impl BuiltStore {
    pub fn into_shared(self) -> Arc<dyn WindowStore> {
        match self {
            Self::Memory(store) => Arc::new(store),
            #[cfg(feature = "redis")]
            Self::Redis(store) => Arc::new(store),
        }
    }
}

/// Construct the configured window store
pub async fn build_store(config: &StoreConfig) -> Result<BuiltStore, StartupError> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory rate-limit store; quota is not shared between instances");
            Ok(BuiltStore::Memory(InMemoryWindowStore::new()))
        }
        #[cfg(feature = "redis")]
        StoreBackend::Redis => {
            let url = config.redis_url.as_deref().unwrap_or_default();
            let store = webhook_gate_core::adapters::RedisWindowStore::connect(url).await?;
            info!("Connected to the Redis rate-limit store");
            Ok(BuiltStore::Redis(store))
        }
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => Err(StartupError::UnsupportedBackend {
            backend: "redis".to_string(),
        }),
    }
}

/// Periodically drop idle in-memory windows
pub fn spawn_window_eviction(
    store: InMemoryWindowStore,
    interval: Duration,
    max_window_ms: i64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let clock = SystemClock;
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.evict_idle(clock.now_millis(), max_window_ms) {
                Ok(0) => {}
                Ok(evicted) => info!(
                    evicted,
                    remaining = store.tracked_keys(),
                    "Evicted idle rate-limit windows"
                ),
                Err(e) => warn!(error = %e, "Rate-limit window eviction failed"),
            }
        }
    })
}
