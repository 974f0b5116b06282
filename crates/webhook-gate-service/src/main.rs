//! # Webhook Gate Service
//!
//! Binary entry point for the webhook gate HTTP service.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes logging and metrics
//! - Builds the tenant directory, rate-limit store and gate
//! - Starts the HTTP server from webhook-gate-api
//!
//! Exit codes: 1 bind failure, 2 server failure, 3 configuration or startup
//! failure.

mod bootstrap;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use webhook_gate_api::{
    start_server, AppState, DefaultHealthChecker, LoggingAdmissionSink, LoggingConfig,
    ServiceError, ServiceMetrics,
};
use webhook_gate_core::{adapters::InMemoryDeliveryCache, WebhookGate};

const EXIT_BIND_FAILED: i32 = 1;
const EXIT_SERVER_FAILED: i32 = 2;
const EXIT_CONFIGURATION: i32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let explicit_path = std::env::var(bootstrap::CONFIG_FILE_ENV).ok();
    let loaded = bootstrap::load_config(explicit_path.as_deref());

    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    bootstrap::init_tracing(&logging);

    info!("Starting webhook gate service");

    let service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(
                error = %e,
                "Could not load service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(EXIT_CONFIGURATION);
    }

    // -------------------------------------------------------------------------
    // Collaborators
    // -------------------------------------------------------------------------
    let directory = match bootstrap::build_directory(&service_config) {
        Ok(directory) => directory,
        Err(e) => {
            error!(error = %e, "Failed to build tenant directory; aborting");
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    let store = match bootstrap::build_store(&service_config.store).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Failed to build rate-limit store; aborting");
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    if let bootstrap::BuiltStore::Memory(memory) = &store {
        bootstrap::spawn_window_eviction(
            memory.clone(),
            Duration::from_secs(service_config.store.eviction_interval_seconds),
            bootstrap::longest_window_millis(&service_config),
        );
    }

    let metrics = ServiceMetrics::new().context("failed to register metrics")?;

    let gate_config = service_config.effective_gate_config();
    let mut gate_builder = WebhookGate::builder(directory, store.into_shared())
        .config(gate_config.clone())
        .metrics(metrics.clone());
    if gate_config.duplicate_detection {
        info!("Duplicate delivery detection enabled");
        gate_builder = gate_builder.delivery_cache(Arc::new(InMemoryDeliveryCache::new()));
    }

    let gate = match gate_builder.build() {
        Ok(gate) => gate,
        Err(e) => {
            error!(error = %e, "Gate configuration is invalid; aborting");
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        admin_api = service_config.admin.is_enabled(),
        "Starting HTTP server"
    );

    let state = AppState::new(
        service_config,
        Arc::new(gate),
        Arc::new(LoggingAdmissionSink),
        Arc::new(DefaultHealthChecker),
        metrics,
    );

    if let Err(e) = start_server(state, shutdown_signal()).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => EXIT_BIND_FAILED,
            ServiceError::ServerFailed { .. } => EXIT_SERVER_FAILED,
            ServiceError::Configuration(_) => EXIT_CONFIGURATION,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
