//! # Webhook Gate HTTP Service
//!
//! HTTP server that puts the [`WebhookGate`] in front of webhook ingestion.
//!
//! This service provides:
//! - The gated webhook endpoint `POST /webhooks/{endpoint}`
//! - Health, readiness and Prometheus metrics endpoints
//! - An optional admin API for rate-limit inspection and reset

pub mod config;
pub mod errors;
pub mod metrics;
pub mod sink;

pub use config::{
    AdminConfig, LoggingConfig, ServerConfig, ServiceConfig, StoreBackend, StoreConfig,
    TenantConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;
pub use sink::{AdmissionSink, AdmittedWebhook, LoggingAdmissionSink, SinkError};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

use axum::{
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use serde::Serialize;
use std::{collections::HashMap, future::Future, net::IpAddr, sync::Arc, time::Duration};
use subtle::ConstantTimeEq;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};
use webhook_gate_core::{
    gate::RateLimitStatus, EndpointId, RateLimitPolicy, TenantId, ValidationOutcome, WebhookGate,
    WebhookRequest,
};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Validation chain every inbound webhook passes through
    pub gate: Arc<WebhookGate>,

    /// Consumer of admitted webhooks
    pub sink: Arc<dyn AdmissionSink>,

    /// Health checker for system monitoring
    pub health_checker: Arc<dyn HealthChecker>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        gate: Arc<WebhookGate>,
        sink: Arc<dyn AdmissionSink>,
        health_checker: Arc<dyn HealthChecker>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            gate,
            sink,
            health_checker,
            metrics,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.timeout_seconds);
    let max_body_size = state.config.server.max_body_size;

    let webhook_routes = Router::new().route("/webhooks/{endpoint}", post(handle_webhook));

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let mut router = Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(observability_routes);

    if state.config.admin.is_enabled() {
        let admin_routes = Router::new()
            .route(
                "/admin/rate-limits/{tenant_id}/{endpoint}",
                get(get_rate_limit_status),
            )
            .route(
                "/admin/rate-limits/{tenant_id}/{endpoint}/reset",
                post(reset_rate_limit),
            )
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_admin_token,
            ));
        router = router.merge(admin_routes);
    } else {
        info!("Admin API disabled: no admin token configured");
    }

    // Layers wrap outwards: tracing sees every request, limits run innermost.
    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start HTTP server
///
/// Runs until `shutdown` resolves, then lets in-flight requests finish for up
/// to `server.shutdown_timeout_seconds`.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = state.config.server.bind_address();
    let shutdown_timeout = Duration::from_secs(state.config.server.shutdown_timeout_seconds);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!(address = %address, "Starting HTTP server");

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let graceful = async move {
        shutdown.await;
        info!(
            timeout_seconds = shutdown_timeout.as_secs(),
            "Shutdown requested, draining in-flight requests"
        );
        let _ = drain_tx.send(());
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(graceful);
    let server = async move { server.await.map_err(|e| e.to_string()) };
    tokio::pin!(server);

    // The drain deadline starts when shutdown is requested, not at startup.
    let drained = async {
        if drain_rx.await.is_ok() {
            tokio::time::sleep(shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = &mut server => {
            result.map_err(|message| ServiceError::ServerFailed { message })?;
        }
        _ = drained => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, dropping remaining connections"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Handle an inbound webhook for `endpoint`
///
/// Runs the gate, hands admitted webhooks to the [`AdmissionSink`] and returns
/// `202 Accepted`. Rejections become the status codes documented on
/// [`WebhookHandlerError`].
#[instrument(skip_all, fields(endpoint = %endpoint))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), WebhookHandlerError> {
    let endpoint = EndpointId::new(endpoint).map_err(WebhookHandlerError::InvalidEndpoint)?;

    let request =
        WebhookRequest::new(header_map(&headers), body).with_source_ip(source_ip(&headers));

    let tenant = match state.gate.validate(&request, &endpoint).await {
        ValidationOutcome::Admitted(tenant) => tenant,
        ValidationOutcome::Rejected(rejection) => {
            return Err(WebhookHandlerError::Rejected(rejection))
        }
    };

    let tenant_id = tenant.as_str().to_string();
    let admitted = AdmittedWebhook {
        tenant: tenant.clone(),
        endpoint,
        body: request.body.clone(),
        received_at: request.received_at,
    };

    if let Err(e) = state.sink.accept(admitted).await {
        // The sender is told to retry; that retry must not count as a duplicate.
        state.gate.release_delivery(&tenant, &request.body).await;
        return Err(e.into());
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted".to_string(),
            tenant_id,
        }),
    ))
}

/// Lower-cased header map; values that are not valid UTF-8 become empty
fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_lowercase(),
                v.to_str().unwrap_or("").to_string(),
            )
        })
        .collect()
}

/// Client address from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn source_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Basic health check endpoint
#[instrument(skip(state))]
async fn handle_health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let status = state.health_checker.check_basic_health().await;

    let response = HealthResponse {
        status: if status.is_healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks: status.checks,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    if status.is_healthy {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Readiness check for load balancers
#[instrument(skip(state))]
async fn handle_readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let is_ready = state.health_checker.check_readiness().await;

    let response = ReadinessResponse {
        ready: is_ready,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    if is_ready {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

// ============================================================================
// Observability Handlers
// ============================================================================

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let body = state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Response::builder()
        .header(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)
        .body(body.into())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// ============================================================================
// Admin Handlers
// ============================================================================

fn parse_window_path(
    tenant_id: String,
    endpoint: String,
) -> Result<(TenantId, EndpointId), WebhookHandlerError> {
    let tenant_id = TenantId::new(tenant_id).map_err(WebhookHandlerError::InvalidParameter)?;
    let endpoint = EndpointId::new(endpoint).map_err(WebhookHandlerError::InvalidParameter)?;
    Ok((tenant_id, endpoint))
}

/// Current window usage and the effective policy
#[instrument(skip(state))]
async fn get_rate_limit_status(
    State(state): State<AppState>,
    Path((tenant_id, endpoint)): Path<(String, String)>,
) -> Result<Json<RateLimitStatusResponse>, WebhookHandlerError> {
    let (tenant_id, endpoint) = parse_window_path(tenant_id, endpoint)?;
    let RateLimitStatus { used, policy } =
        state.gate.rate_limit_status(&tenant_id, &endpoint).await?;

    Ok(Json(RateLimitStatusResponse {
        tenant_id: tenant_id.to_string(),
        endpoint: endpoint.to_string(),
        used,
        remaining: u64::from(policy.limit).saturating_sub(used),
        policy,
    }))
}

/// Clear the window so the tenant's quota is restored immediately
#[instrument(skip(state))]
async fn reset_rate_limit(
    State(state): State<AppState>,
    Path((tenant_id, endpoint)): Path<(String, String)>,
) -> Result<Json<RateLimitResetResponse>, WebhookHandlerError> {
    let (tenant_id, endpoint) = parse_window_path(tenant_id, endpoint)?;
    state.gate.reset_window(&tenant_id, &endpoint).await?;

    Ok(Json(RateLimitResetResponse {
        tenant_id: tenant_id.to_string(),
        endpoint: endpoint.to_string(),
        status: "reset".to_string(),
    }))
}

// ============================================================================
// Middleware
// ============================================================================

/// Reject admin requests without the configured bearer token
async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, WebhookHandlerError> {
    let Some(expected) = state.config.admin.token.as_deref() else {
        return Err(WebhookHandlerError::Unauthorized);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(next.run(request).await)
    } else {
        Err(WebhookHandlerError::Unauthorized)
    }
}

/// Request logging middleware with request ID tracking
///
/// Extracts or generates an `x-request-id`, logs completion with the status
/// and latency, and echoes the id on the response.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    path = %request.uri().path(),
    request_id
))]
async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("request_id", request_id.as_str());
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

// ============================================================================
// Response Types
// ============================================================================

/// Body of a `202 Accepted` webhook response
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: String,
    pub tenant_id: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub checks: HashMap<String, HealthCheckResult>,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatusResponse {
    pub tenant_id: String,
    pub endpoint: String,
    pub used: u64,
    pub remaining: u64,
    pub policy: RateLimitPolicy,
}

#[derive(Debug, Serialize)]
pub struct RateLimitResetResponse {
    pub tenant_id: String,
    pub endpoint: String,
    pub status: String,
}

// ============================================================================
// Health Checking
// ============================================================================

/// Health status information
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub checks: HashMap<String, HealthCheckResult>,
}

/// Individual health check result
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub message: String,
    pub duration_ms: u64,
}

/// Interface for system health monitoring
#[async_trait::async_trait]
pub trait HealthChecker: Send + Sync {
    /// Basic health check (fast)
    async fn check_basic_health(&self) -> HealthStatus;

    /// Readiness check for load balancers
    async fn check_readiness(&self) -> bool;
}

/// Health checker that reports the process as alive and ready
pub struct DefaultHealthChecker;

#[async_trait::async_trait]
impl HealthChecker for DefaultHealthChecker {
    async fn check_basic_health(&self) -> HealthStatus {
        let start = std::time::Instant::now();
        let mut checks = HashMap::new();

        checks.insert(
            "service".to_string(),
            HealthCheckResult {
                healthy: true,
                message: "Service is running".to_string(),
                duration_ms: start.elapsed().as_millis() as u64,
            },
        );

        HealthStatus {
            is_healthy: true,
            checks,
        }
    }

    async fn check_readiness(&self) -> bool {
        true
    }
}
