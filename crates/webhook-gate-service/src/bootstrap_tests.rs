//! Tests for configuration layering and collaborator construction.

use super::*;
use serial_test::serial;
use std::io::Write;
use webhook_gate_api::TenantConfig;
use webhook_gate_core::{RateLimitPolicy, TenantId};

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn tenant(id: &str, window_seconds: u64) -> TenantConfig {
    TenantConfig {
        tenant_id: id.to_string(),
        secret: format!("{}-secret", id),
        active: true,
        rate_limits: [(
            "tickets".to_string(),
            RateLimitPolicy::new(10, window_seconds).unwrap(),
        )]
        .into_iter()
        .collect(),
    }
}

// ============================================================================
// Configuration layering
// ============================================================================

mod load_config_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_no_sources_yields_defaults() {
        std::env::remove_var("WG__SERVER__PORT");
        let config = load_config(None).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_explicit_file_is_loaded() {
        std::env::remove_var("WG__SERVER__PORT");
        let file = write_yaml(
            r#"
server:
  port: 9191
gate:
  duplicate_detection: true
tenants:
  - tenant_id: acme-corp
    secret: whsec-acme
"#,
        );

        let config = load_config(file.path().to_str()).unwrap();

        assert_eq!(config.server.port, 9191);
        assert!(config.gate.duplicate_detection);
        assert_eq!(config.tenants.len(), 1);
    }

    /// Verify that environment variables override file values.
    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let file = write_yaml("server:\n  port: 9191\n");
        std::env::set_var("WG__SERVER__PORT", "9292");

        let result = load_config(file.path().to_str());
        std::env::remove_var("WG__SERVER__PORT");

        assert_eq!(result.unwrap().server.port, 9292);
    }

    #[test]
    #[serial]
    fn test_cache_settings_are_loaded() {
        std::env::remove_var("WG__SERVER__PORT");
        let file = write_yaml(
            "tenant_cache_ttl_seconds: 30\ntenant_cache_stale_grace_seconds: 90\n",
        );

        let config = load_config(file.path().to_str()).unwrap();

        assert_eq!(config.tenant_cache_ttl_seconds, 30);
        assert_eq!(config.tenant_cache_stale_grace_seconds, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_fails() {
        let result = load_config(Some("/nonexistent/webhook-gate/service.yaml"));
        assert!(matches!(result, Err(StartupError::Load(_))));
    }

    #[test]
    #[serial]
    fn test_malformed_value_fails() {
        let file = write_yaml("server:\n  port: not-a-port\n");
        assert!(load_config(file.path().to_str()).is_err());
    }
}

// ============================================================================
// Collaborators
// ============================================================================

mod collaborator_tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_serves_configured_tenants() {
        let config = ServiceConfig {
            tenants: vec![tenant("acme-corp", 60)],
            ..ServiceConfig::default()
        };

        let directory = build_directory(&config).unwrap();
        let record = directory
            .lookup(&TenantId::new("acme-corp").unwrap())
            .await
            .unwrap();

        assert_eq!(record.secret.expose_bytes(), b"acme-corp-secret");
        assert!(directory
            .lookup(&TenantId::new("globex").unwrap())
            .await
            .is_err());
    }

    #[test]
    fn test_longest_window_covers_overrides() {
        let config = ServiceConfig {
            tenants: vec![tenant("acme-corp", 30), tenant("globex", 900)],
            ..ServiceConfig::default()
        };
        assert_eq!(longest_window_millis(&config), 900_000);
        assert_eq!(longest_window_millis(&ServiceConfig::default()), 60_000);
    }

    #[tokio::test]
    async fn test_memory_store_is_default() {
        let store = build_store(&StoreConfig::default()).await.unwrap();
        assert!(matches!(store, BuiltStore::Memory(_)));
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn test_redis_backend_requires_feature() {
        let config = StoreConfig {
            backend: StoreBackend::Redis,
            redis_url: Some("redis://localhost:6379".to_string()),
            ..StoreConfig::default()
        };
        assert!(matches!(
            build_store(&config).await,
            Err(StartupError::UnsupportedBackend { .. })
        ));
    }
}
