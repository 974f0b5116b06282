//! Common test utilities for webhook-gate-api integration tests
//!
//! This module provides:
//! - A recording admission sink
//! - A test application wired with in-memory collaborators and a manual clock
//! - Builders for signed, unsigned and admin requests

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use webhook_gate_api::{
    create_router, AdminConfig, AdmissionSink, AdmittedWebhook, AppState, DefaultHealthChecker,
    ServiceConfig, ServiceMetrics, SinkError,
};
use webhook_gate_core::{
    adapters::{InMemoryDeliveryCache, InMemoryTenantDirectory, InMemoryWindowStore},
    directory::{SecretValue, TenantRecord},
    signature::compute_signature,
    EndpointId, ManualClock, RateLimitPolicy, TenantId, WebhookGate,
};

pub const ACME_SECRET: &str = "whsec-acme-corp";
pub const GLOBEX_SECRET: &str = "whsec-globex";
pub const ADMIN_TOKEN: &str = "admin-token-0123456789";

/// Endpoint on which acme-corp is limited to 3 requests per minute
pub const LIMITED_ENDPOINT: &str = "tickets";

/// Endpoint on which globex is limited to 10 requests per minute
pub const BURST_ENDPOINT: &str = "burst";

// ============================================================================
// Recording Sink
// ============================================================================

/// Sink that keeps every admitted webhook for inspection
#[derive(Default)]
pub struct RecordingSink {
    accepted: Mutex<Vec<AdmittedWebhook>>,
}

impl RecordingSink {
    pub fn accepted(&self) -> Vec<AdmittedWebhook> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }
}

#[async_trait]
impl AdmissionSink for RecordingSink {
    async fn accept(&self, webhook: AdmittedWebhook) -> Result<(), SinkError> {
        self.accepted.lock().unwrap().push(webhook);
        Ok(())
    }
}

// ============================================================================
// Test Application
// ============================================================================

/// Router plus handles on the collaborators a test may need to steer
pub struct TestApp {
    pub router: Router,
    pub sink: Arc<RecordingSink>,
    pub clock: Arc<ManualClock>,
    pub directory: Arc<InMemoryTenantDirectory>,
}

/// Instant the manual clock starts at
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 8, 43, 40).unwrap()
}

/// Admin-enabled configuration used by most tests
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        admin: AdminConfig {
            token: Some(ADMIN_TOKEN.to_string()),
        },
        ..ServiceConfig::default()
    }
}

fn tenants() -> Vec<TenantRecord> {
    vec![
        TenantRecord::new(
            TenantId::new("acme-corp").unwrap(),
            SecretValue::from_string(ACME_SECRET.to_string()),
        )
        .with_rate_limit(
            EndpointId::new(LIMITED_ENDPOINT).unwrap(),
            RateLimitPolicy::new(3, 60).unwrap(),
        ),
        TenantRecord::new(
            TenantId::new("globex").unwrap(),
            SecretValue::from_string(GLOBEX_SECRET.to_string()),
        )
        .with_rate_limit(
            EndpointId::new(BURST_ENDPOINT).unwrap(),
            RateLimitPolicy::new(10, 60).unwrap(),
        ),
        TenantRecord::new(
            TenantId::new("dormant-co").unwrap(),
            SecretValue::from_string("whsec-dormant".to_string()),
        )
        .inactive(),
    ]
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Build the app; duplicate detection follows `config.gate.duplicate_detection`
    pub fn with_config(config: ServiceConfig) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let directory = Arc::new(InMemoryTenantDirectory::with_tenants(tenants()));
        let sink = Arc::new(RecordingSink::default());
        let metrics = ServiceMetrics::new().unwrap();

        let gate_config = config.effective_gate_config();
        let mut builder =
            WebhookGate::builder(directory.clone(), Arc::new(InMemoryWindowStore::new()))
                .config(gate_config.clone())
                .clock(clock.clone())
                .metrics(metrics.clone());
        if gate_config.duplicate_detection {
            builder = builder.delivery_cache(Arc::new(InMemoryDeliveryCache::new()));
        }
        let gate = builder.build().unwrap();

        let state = AppState::new(
            config,
            Arc::new(gate),
            sink.clone(),
            Arc::new(DefaultHealthChecker),
            metrics,
        );

        Self {
            router: create_router(state),
            sink,
            clock,
            directory,
        }
    }

    /// Payload for `tenant` stamped with the current manual-clock time
    pub fn payload(&self, tenant: &str) -> String {
        payload_at(tenant, webhook_gate_core::Clock::now(self.clock.as_ref()))
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

// ============================================================================
// Request Builders
// ============================================================================

/// JSON payload naming `tenant` with a `created_at` of `instant`
pub fn payload_at(tenant: &str, instant: DateTime<Utc>) -> String {
    serde_json::json!({
        "tenant_id": tenant,
        "created_at": instant.to_rfc3339_opts(SecondsFormat::Secs, true),
        "event": "ticket.created",
        "ticket": { "id": 4711, "priority": "high" }
    })
    .to_string()
}

fn webhook_builder(endpoint: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(format!("/webhooks/{}", endpoint))
        .header("content-type", "application/json")
}

/// POST `body` to `endpoint` with a signature computed from `secret`
pub fn signed_request(endpoint: &str, body: &str, secret: &str) -> Request<Body> {
    webhook_builder(endpoint)
        .header(
            "X-Webhook-Signature",
            compute_signature(secret.as_bytes(), body.as_bytes()),
        )
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn unsigned_request(endpoint: &str, body: &str) -> Request<Body> {
    webhook_builder(endpoint)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn admin_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Response body parsed as JSON
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
