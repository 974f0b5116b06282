//! Hand-off of admitted webhooks to the processing pipeline.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::info;
use webhook_gate_core::{AuthenticatedTenant, EndpointId};

/// A webhook that passed every gate check
#[derive(Debug, Clone)]
pub struct AdmittedWebhook {
    pub tenant: AuthenticatedTenant,
    pub endpoint: EndpointId,

    /// Exact body bytes the signature was verified over
    pub body: Bytes,

    pub received_at: DateTime<Utc>,
}

/// Errors from handing an admitted webhook downstream
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("Downstream pipeline unavailable: {message}")]
    Unavailable { message: String },
}

/// Downstream consumer of admitted webhooks
///
/// Implementations must not block the request for long; the response to the
/// sender waits on [`AdmissionSink::accept`].
#[async_trait]
pub trait AdmissionSink: Send + Sync {
    async fn accept(&self, webhook: AdmittedWebhook) -> Result<(), SinkError>;
}

/// Sink that logs each admission and discards the body
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAdmissionSink;

#[async_trait]
impl AdmissionSink for LoggingAdmissionSink {
    async fn accept(&self, webhook: AdmittedWebhook) -> Result<(), SinkError> {
        info!(
            tenant_id = %webhook.tenant,
            endpoint = %webhook.endpoint,
            body_len = webhook.body.len(),
            received_at = %webhook.received_at.to_rfc3339(),
            "Webhook accepted for processing"
        );
        Ok(())
    }
}
