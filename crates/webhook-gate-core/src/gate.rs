//! # Webhook Gate
//!
//! Sequences the validation chain for one inbound webhook.
//!
//! ```text
//! Tenant → Lookup → Signature → Timestamp → [Duplicate] → RateLimit → Admitted
//!    ↓        ↓          ↓           ↓            ↓            ↓
//!                         Rejected(reason)
//! ```
//!
//! The order is fixed. Cheap syntactic checks run first, the external lookup
//! next, and quota accounting last so that only authenticated requests consume
//! a tenant's quota. The first failing stage ends the pass; no later check
//! runs after a rejection.
//!
//! Every rejection is logged with the stage, reason, claimed tenant, source
//! address, endpoint and body length. Secrets and signature values are never
//! logged.

use crate::clock::{Clock, SystemClock};
use crate::delivery::{DeliveryCache, DeliveryKey};
use crate::directory::{DirectoryError, TenantDirectory, TenantRecord};
use crate::monitoring::{GateMetrics, NoOpGateMetrics};
use crate::rate_limit::{
    RateLimitDecision, RateLimitError, RateLimitPolicy, RateLimiter, WindowStore,
};
use crate::replay::{self, FreshnessPolicy, TimestampError};
use crate::signature::{normalize_signature_header, verify_signature};
use crate::tenant::{parse_payload, PayloadError, ParsedPayload};
use crate::{EndpointId, TenantId, ValidationError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;

// ============================================================================
// Configuration
// ============================================================================

/// Gate settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Header carrying the hex HMAC-SHA256 signature (case-insensitive)
    pub signature_header: String,

    /// Payload field carrying the creation timestamp
    pub timestamp_field: String,

    pub freshness: FreshnessPolicy,

    /// Upper bound on one tenant directory lookup
    pub lookup_timeout_ms: u64,

    /// Upper bound on one rate-limit store or delivery cache call
    pub store_timeout_ms: u64,

    /// Policy for endpoints without a tenant-specific override
    pub default_rate_limit: RateLimitPolicy,

    /// Refuse a second delivery of an identical body inside the freshness window
    pub duplicate_detection: bool,
}

impl GateConfig {
    pub const DEFAULT_SIGNATURE_HEADER: &'static str = "x-webhook-signature";
    pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 250;
    pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 250;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.signature_header.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "signature_header".to_string(),
            });
        }
        if !is_valid_header_name(&self.signature_header) {
            return Err(ValidationError::InvalidCharacters {
                field: "signature_header".to_string(),
                invalid_chars: "header names are ASCII letters, digits and '-'".to_string(),
            });
        }
        if self.timestamp_field.is_empty() {
            return Err(ValidationError::Required {
                field: "timestamp_field".to_string(),
            });
        }
        for (field, value) in [
            ("lookup_timeout_ms", self.lookup_timeout_ms),
            ("store_timeout_ms", self.store_timeout_ms),
        ] {
            if !(1..=10_000).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    field: field.to_string(),
                    min: 1,
                    max: 10_000,
                    actual: value,
                });
            }
        }
        self.freshness.validate()?;
        self.default_rate_limit.validate()
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            signature_header: Self::DEFAULT_SIGNATURE_HEADER.to_string(),
            timestamp_field: replay::DEFAULT_TIMESTAMP_FIELD.to_string(),
            freshness: FreshnessPolicy::default(),
            lookup_timeout_ms: Self::DEFAULT_LOOKUP_TIMEOUT_MS,
            store_timeout_ms: Self::DEFAULT_STORE_TIMEOUT_MS,
            default_rate_limit: RateLimitPolicy::default(),
            duplicate_detection: false,
        }
    }
}

fn is_valid_header_name(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

// ============================================================================
// Request and Outcome Types
// ============================================================================

/// Raw inbound webhook as seen by the gate
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    /// Header map with lower-cased names
    pub headers: HashMap<String, String>,

    /// Exact request body bytes
    pub body: Bytes,

    pub received_at: DateTime<Utc>,

    pub source_ip: Option<IpAddr>,
}

impl WebhookRequest {
    pub fn new(headers: HashMap<String, String>, body: Bytes) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        Self {
            headers,
            body,
            received_at: Utc::now(),
            source_ip: None,
        }
    }

    pub fn with_source_ip(mut self, source_ip: Option<IpAddr>) -> Self {
        self.source_ip = source_ip;
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|value| value.as_str())
    }
}

/// Position in the validation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    TenantResolution,
    SecretLookup,
    Signature,
    Timestamp,
    Duplicate,
    RateLimit,
}

impl GateStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TenantResolution => "tenant_resolution",
            Self::SecretLookup => "secret_lookup",
            Self::Signature => "signature",
            Self::Timestamp => "timestamp",
            Self::Duplicate => "duplicate",
            Self::RateLimit => "rate_limit",
        }
    }
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant whose request passed signature verification
///
/// Only the gate constructs this type, so downstream code holding one knows
/// the id was authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthenticatedTenant(TenantId);

impl AuthenticatedTenant {
    pub fn tenant_id(&self) -> &TenantId {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_inner(self) -> TenantId {
        self.0
    }
}

impl fmt::Display for AuthenticatedTenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collaborator that failed or timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    TenantDirectory,
    RateLimitStore,
    DeliveryCache,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TenantDirectory => "tenant_directory",
            Self::RateLimitStore => "rate_limit_store",
            Self::DeliveryCache => "delivery_cache",
        }
    }
}

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("Invalid payload: {0}")]
    InvalidPayload(PayloadError),

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Tenant is inactive")]
    TenantInactive,

    #[error("Missing signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid timestamp")]
    TimestampInvalid(TimestampError),

    #[error("Duplicate delivery")]
    DuplicateDelivery,

    #[error("Rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Dependency unavailable: {}", .dependency.as_str())]
    Unavailable { dependency: Dependency },
}

impl RejectionReason {
    /// Stable machine-readable kind, shared by logs, metrics and responses
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "invalid_payload",
            Self::TenantNotFound => "tenant_not_found",
            Self::TenantInactive => "tenant_inactive",
            Self::MissingSignature => "missing_signature",
            Self::InvalidSignature => "invalid_signature",
            Self::TimestampInvalid(_) => "timestamp_invalid",
            Self::DuplicateDelivery => "duplicate_delivery",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable { .. } => "unavailable",
        }
    }

    /// Sub-kind kept for logs; never shown to callers
    pub fn detail(&self) -> Option<&'static str> {
        match self {
            Self::InvalidPayload(e) => Some(e.kind()),
            Self::TimestampInvalid(e) => Some(e.kind()),
            Self::Unavailable { dependency } => Some(dependency.as_str()),
            _ => None,
        }
    }
}

/// A refused request with diagnostic context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub stage: GateStage,

    /// Claimed tenant, if the payload got far enough to name one
    pub tenant_id: Option<TenantId>,
}

impl Rejection {
    fn new(reason: RejectionReason, stage: GateStage, tenant_id: Option<&TenantId>) -> Self {
        Self {
            reason,
            stage,
            tenant_id: tenant_id.cloned(),
        }
    }

    /// Caller-facing retry hint in seconds
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self.reason {
            RejectionReason::RateLimited {
                retry_after_seconds,
            } => Some(retry_after_seconds),
            RejectionReason::Unavailable { .. } => Some(1),
            _ => None,
        }
    }
}

/// Result of one validation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Admitted(AuthenticatedTenant),
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Admitted(_) => None,
        }
    }
}

/// Errors from administrative gate operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

/// Current state of one rate-limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub used: u64,
    pub policy: RateLimitPolicy,
}

// ============================================================================
// Gate
// ============================================================================

/// Builder for [`WebhookGate`]
pub struct GateBuilder {
    config: GateConfig,
    directory: Arc<dyn TenantDirectory>,
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn GateMetrics>,
    deliveries: Option<Arc<dyn DeliveryCache>>,
}

impl GateBuilder {
    pub fn config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn GateMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Cache used when `duplicate_detection` is enabled
    pub fn delivery_cache(mut self, deliveries: Arc<dyn DeliveryCache>) -> Self {
        self.deliveries = Some(deliveries);
        self
    }

    pub fn build(self) -> Result<WebhookGate, ValidationError> {
        self.config.validate()?;

        let deliveries = match (self.config.duplicate_detection, self.deliveries) {
            (false, _) => None,
            (true, Some(cache)) => Some(cache),
            (true, None) => {
                return Err(ValidationError::Required {
                    field: "delivery_cache".to_string(),
                })
            }
        };

        Ok(WebhookGate {
            limiter: RateLimiter::with_clock(self.store, Arc::clone(&self.clock)),
            config: self.config,
            directory: self.directory,
            clock: self.clock,
            metrics: self.metrics,
            deliveries,
        })
    }
}

/// The validation chain for inbound webhooks
#[derive(Clone)]
pub struct WebhookGate {
    config: GateConfig,
    directory: Arc<dyn TenantDirectory>,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn GateMetrics>,
    deliveries: Option<Arc<dyn DeliveryCache>>,
}

impl WebhookGate {
    pub fn builder(
        directory: Arc<dyn TenantDirectory>,
        store: Arc<dyn WindowStore>,
    ) -> GateBuilder {
        GateBuilder {
            config: GateConfig::default(),
            directory,
            store,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(NoOpGateMetrics),
            deliveries: None,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run the full validation chain for one request
    #[instrument(
        skip(self, request, endpoint),
        fields(endpoint = %endpoint, body_len = request.body.len())
    )]
    pub async fn validate(
        &self,
        request: &WebhookRequest,
        endpoint: &EndpointId,
    ) -> ValidationOutcome {
        let started = Instant::now();

        match self.run_checks(request, endpoint).await {
            Ok(tenant) => {
                info!(
                    event = "webhook_admitted",
                    tenant_id = %tenant,
                    endpoint = %endpoint,
                    source_ip = ?request.source_ip,
                    body_len = request.body.len(),
                    "Webhook admitted"
                );
                self.metrics
                    .record_admitted(endpoint.as_str(), started.elapsed());
                ValidationOutcome::Admitted(tenant)
            }
            Err(rejection) => {
                log_rejection(&rejection, request, endpoint);
                self.metrics.record_rejected(
                    endpoint.as_str(),
                    rejection.reason.kind(),
                    started.elapsed(),
                );
                ValidationOutcome::Rejected(rejection)
            }
        }
    }

    async fn run_checks(
        &self,
        request: &WebhookRequest,
        endpoint: &EndpointId,
    ) -> Result<AuthenticatedTenant, Rejection> {
        // One clock reading per pass, shared by freshness and rate limiting.
        let now = self.clock.now();

        // Tenant resolution
        let payload = parse_payload(&request.body).map_err(|e| {
            Rejection::new(
                RejectionReason::InvalidPayload(e),
                GateStage::TenantResolution,
                None,
            )
        })?;
        let tenant_id = &payload.tenant_id;

        // Secret lookup
        let record = self.lookup(tenant_id).await?;

        // Signature
        self.check_signature(request, &record)?;

        // Timestamp
        self.check_timestamp(&payload, now)?;

        // Duplicate delivery
        let claim = self.claim_delivery(tenant_id, &request.body, now).await?;

        // Rate limit
        let policy = record.rate_limit_for(endpoint, self.config.default_rate_limit);
        if let Err(rejection) = self
            .check_rate_limit(tenant_id, endpoint, &policy, now)
            .await
        {
            if let Some(key) = claim {
                self.release_claim(&key).await;
            }
            return Err(rejection);
        }

        Ok(AuthenticatedTenant(tenant_id.clone()))
    }

    async fn lookup(&self, tenant_id: &TenantId) -> Result<TenantRecord, Rejection> {
        let reject = |reason| Rejection::new(reason, GateStage::SecretLookup, Some(tenant_id));
        let started = Instant::now();

        let result = tokio::time::timeout(
            self.config.lookup_timeout(),
            self.directory.lookup(tenant_id),
        )
        .await;
        self.metrics
            .record_lookup(started.elapsed(), matches!(result, Ok(Ok(_))));

        let record = match result {
            Ok(Ok(record)) => record,
            Ok(Err(DirectoryError::NotFound { .. })) => {
                return Err(reject(RejectionReason::TenantNotFound))
            }
            Ok(Err(err)) => {
                error!(tenant_id = %tenant_id, error = %err, "Tenant directory lookup failed");
                return Err(reject(RejectionReason::Unavailable {
                    dependency: Dependency::TenantDirectory,
                }));
            }
            Err(_) => {
                error!(
                    tenant_id = %tenant_id,
                    timeout_ms = self.config.lookup_timeout_ms,
                    "Tenant directory lookup timed out"
                );
                return Err(reject(RejectionReason::Unavailable {
                    dependency: Dependency::TenantDirectory,
                }));
            }
        };

        if !record.active {
            return Err(reject(RejectionReason::TenantInactive));
        }

        Ok(record)
    }

    fn check_signature(
        &self,
        request: &WebhookRequest,
        record: &TenantRecord,
    ) -> Result<(), Rejection> {
        let reject =
            |reason| Rejection::new(reason, GateStage::Signature, Some(&record.tenant_id));

        let provided = request
            .header(&self.config.signature_header)
            .map(normalize_signature_header)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| reject(RejectionReason::MissingSignature))?;

        if verify_signature(record.secret.expose_bytes(), &request.body, provided) {
            Ok(())
        } else {
            Err(reject(RejectionReason::InvalidSignature))
        }
    }

    fn check_timestamp(
        &self,
        payload: &ParsedPayload,
        now: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        let reject =
            |reason| Rejection::new(reason, GateStage::Timestamp, Some(&payload.tenant_id));
        let field = self.config.timestamp_field.as_str();

        let raw = payload
            .string_field(field)
            .map_err(|e| reject(RejectionReason::InvalidPayload(e)))?;

        match replay::validate_timestamp(raw, now, &self.config.freshness) {
            Ok(_) => Ok(()),
            Err(e) if e.is_format_error() => Err(reject(RejectionReason::InvalidPayload(
                PayloadError::InvalidField {
                    field: field.to_string(),
                    message: e.to_string(),
                },
            ))),
            Err(e) => Err(reject(RejectionReason::TimestampInvalid(e))),
        }
    }

    async fn claim_delivery(
        &self,
        tenant_id: &TenantId,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<DeliveryKey>, Rejection> {
        let Some(deliveries) = &self.deliveries else {
            return Ok(None);
        };
        let reject = |reason| Rejection::new(reason, GateStage::Duplicate, Some(tenant_id));

        let key = DeliveryKey::from_body(tenant_id.clone(), body);
        let freshness = &self.config.freshness;
        let ttl_ms = freshness
            .max_age_seconds
            .saturating_add(freshness.max_future_skew_seconds)
            .saturating_mul(1000) as i64;

        match tokio::time::timeout(
            self.config.store_timeout(),
            deliveries.try_claim(&key, now.timestamp_millis(), ttl_ms),
        )
        .await
        {
            Ok(Ok(true)) => Ok(Some(key)),
            Ok(Ok(false)) => Err(reject(RejectionReason::DuplicateDelivery)),
            Ok(Err(err)) => {
                error!(tenant_id = %tenant_id, error = %err, "Delivery cache claim failed");
                Err(reject(RejectionReason::Unavailable {
                    dependency: Dependency::DeliveryCache,
                }))
            }
            Err(_) => {
                error!(tenant_id = %tenant_id, "Delivery cache claim timed out");
                Err(reject(RejectionReason::Unavailable {
                    dependency: Dependency::DeliveryCache,
                }))
            }
        }
    }

    async fn release_claim(&self, key: &DeliveryKey) {
        let Some(deliveries) = &self.deliveries else {
            return;
        };
        match tokio::time::timeout(self.config.store_timeout(), deliveries.release(key)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(tenant_id = %key.tenant_id, error = %err, "Failed to release delivery claim")
            }
            Err(_) => warn!(tenant_id = %key.tenant_id, "Releasing delivery claim timed out"),
        }
    }

    async fn check_rate_limit(
        &self,
        tenant_id: &TenantId,
        endpoint: &EndpointId,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        let reject = |reason| Rejection::new(reason, GateStage::RateLimit, Some(tenant_id));

        let result = tokio::time::timeout(
            self.config.store_timeout(),
            self.limiter
                .check_and_record_at(tenant_id, endpoint, policy, now.timestamp_millis()),
        )
        .await;

        match result {
            Ok(Ok(RateLimitDecision::Admitted { .. })) => Ok(()),
            Ok(Ok(RateLimitDecision::Rejected {
                retry_after_seconds,
            })) => Err(reject(RejectionReason::RateLimited {
                retry_after_seconds,
            })),
            Ok(Err(err)) => {
                error!(
                    tenant_id = %tenant_id,
                    endpoint = %endpoint,
                    error = %err,
                    "Rate limit check failed"
                );
                Err(reject(RejectionReason::Unavailable {
                    dependency: Dependency::RateLimitStore,
                }))
            }
            Err(_) => {
                error!(
                    tenant_id = %tenant_id,
                    endpoint = %endpoint,
                    "Rate limit check timed out"
                );
                Err(reject(RejectionReason::Unavailable {
                    dependency: Dependency::RateLimitStore,
                }))
            }
        }
    }

    /// Give back the duplicate-delivery claim of an admitted webhook
    ///
    /// Call this when the admitted webhook could not be handed downstream, so
    /// the sender's retry of the same body is not refused as a duplicate. Does
    /// nothing when duplicate detection is disabled.
    pub async fn release_delivery(&self, tenant: &AuthenticatedTenant, body: &[u8]) {
        if self.deliveries.is_none() {
            return;
        }
        let key = DeliveryKey::from_body(tenant.tenant_id().clone(), body);
        self.release_claim(&key).await;
        info!(
            event = "delivery_claim_released",
            tenant_id = %tenant,
            "Released delivery claim after downstream failure"
        );
    }

    /// Clear the rate-limit window for `tenant_id/endpoint`
    #[instrument(skip(self))]
    pub async fn reset_window(
        &self,
        tenant_id: &TenantId,
        endpoint: &EndpointId,
    ) -> Result<(), GateError> {
        self.limiter.reset(tenant_id, endpoint).await?;
        info!(
            event = "rate_limit_reset",
            tenant_id = %tenant_id,
            endpoint = %endpoint,
            "Rate limit window reset"
        );
        Ok(())
    }

    /// Current window usage and the effective policy for `tenant_id/endpoint`
    pub async fn rate_limit_status(
        &self,
        tenant_id: &TenantId,
        endpoint: &EndpointId,
    ) -> Result<RateLimitStatus, GateError> {
        let record = self.directory.lookup(tenant_id).await?;
        let policy = record.rate_limit_for(endpoint, self.config.default_rate_limit);
        let used = self
            .limiter
            .current_usage(tenant_id, endpoint, &policy)
            .await?;
        Ok(RateLimitStatus { used, policy })
    }
}

impl fmt::Debug for WebhookGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookGate")
            .field("config", &self.config)
            .field("duplicate_detection", &self.deliveries.is_some())
            .finish_non_exhaustive()
    }
}

fn log_rejection(rejection: &Rejection, request: &WebhookRequest, endpoint: &EndpointId) {
    let tenant_id = rejection.tenant_id.as_ref().map(TenantId::as_str);

    if matches!(rejection.reason, RejectionReason::Unavailable { .. }) {
        error!(
            event = "webhook_rejected",
            stage = rejection.stage.as_str(),
            reason = rejection.reason.kind(),
            detail = rejection.reason.detail(),
            tenant_id = tenant_id,
            source_ip = ?request.source_ip,
            endpoint = %endpoint,
            body_len = request.body.len(),
            "Webhook rejected: dependency unavailable"
        );
    } else {
        warn!(
            event = "webhook_rejected",
            stage = rejection.stage.as_str(),
            reason = rejection.reason.kind(),
            detail = rejection.reason.detail(),
            tenant_id = tenant_id,
            source_ip = ?request.source_ip,
            endpoint = %endpoint,
            body_len = request.body.len(),
            retry_after_seconds = rejection.retry_after_seconds(),
            "Webhook rejected"
        );
    }
}
