//! Error types for the HTTP service

use crate::sink::SinkError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, warn};
use webhook_gate_core::{
    directory::DirectoryError, gate::GateError, Rejection, RejectionReason, ValidationError,
};

/// Webhook handler errors with HTTP status code mapping
///
/// Gate rejections map on their top-level kind only:
///
/// - `401 Unauthorized`: missing or invalid signature, stale or future timestamp
/// - `403 Forbidden`: tenant is inactive
/// - `404 Not Found`: tenant is unknown
/// - `409 Conflict`: duplicate delivery
/// - `422 Unprocessable Entity`: malformed payload
/// - `429 Too Many Requests`: rate limited, with `Retry-After`
/// - `503 Service Unavailable`: a collaborator failed, with `Retry-After: 1`
///
/// # Security Considerations
///
/// Messages returned to clients are fixed per kind. Sub-kinds, tenant context
/// and collaborator errors are logged server-side only.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// The gate refused the request
    #[error("Webhook rejected: {}", .0.reason)]
    Rejected(Rejection),

    /// The `{endpoint}` path segment is not a valid endpoint id
    ///
    /// Maps to: `400 Bad Request`
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(ValidationError),

    /// An admin path parameter failed validation
    ///
    /// Maps to: `400 Bad Request`
    #[error("Invalid request: {0}")]
    InvalidParameter(ValidationError),

    /// Missing or wrong admin bearer token
    ///
    /// Maps to: `401 Unauthorized`
    #[error("Unauthorized")]
    Unauthorized,

    /// Admin lookup of a tenant that does not exist
    ///
    /// Maps to: `404 Not Found`
    #[error("Tenant not found")]
    TenantNotFound,

    /// The downstream pipeline did not take the admitted webhook
    ///
    /// Maps to: `503 Service Unavailable`
    #[error("Downstream unavailable: {0}")]
    Downstream(#[from] SinkError),

    /// A collaborator failed during an admin operation
    ///
    /// Maps to: `503 Service Unavailable`
    #[error("Dependency unavailable: {message}")]
    Unavailable { message: String },
}

impl WebhookHandlerError {
    /// Machine-readable kind used as the `error` field of the response body
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected(rejection) => rejection.reason.kind(),
            Self::InvalidEndpoint(_) => "invalid_endpoint",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::Unauthorized => "unauthorized",
            Self::TenantNotFound => "tenant_not_found",
            Self::Downstream(_) | Self::Unavailable { .. } => "unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected(rejection) => rejection_status(&rejection.reason),
            Self::InvalidEndpoint(_) | Self::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::TenantNotFound => StatusCode::NOT_FOUND,
            Self::Downstream(_) | Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Rejected(rejection) => rejection_message(&rejection.reason),
            Self::InvalidEndpoint(_) => "Endpoint name is not valid".to_string(),
            Self::InvalidParameter(e) => e.to_string(),
            Self::Unauthorized => "A valid admin token is required".to_string(),
            Self::TenantNotFound => "Tenant not found".to_string(),
            Self::Downstream(_) | Self::Unavailable { .. } => {
                "Service temporarily unavailable. Please retry.".to_string()
            }
        }
    }

    fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::Rejected(rejection) => rejection.retry_after_seconds(),
            Self::Downstream(_) | Self::Unavailable { .. } => Some(1),
            _ => None,
        }
    }
}

impl From<GateError> for WebhookHandlerError {
    fn from(value: GateError) -> Self {
        match value {
            GateError::Directory(DirectoryError::NotFound { .. }) => Self::TenantNotFound,
            other => Self::Unavailable {
                message: other.to_string(),
            },
        }
    }
}

/// HTTP status for a gate rejection
pub fn rejection_status(reason: &RejectionReason) -> StatusCode {
    match reason {
        RejectionReason::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RejectionReason::TenantNotFound => StatusCode::NOT_FOUND,
        RejectionReason::TenantInactive => StatusCode::FORBIDDEN,
        RejectionReason::MissingSignature
        | RejectionReason::InvalidSignature
        | RejectionReason::TimestampInvalid(_) => StatusCode::UNAUTHORIZED,
        RejectionReason::DuplicateDelivery => StatusCode::CONFLICT,
        RejectionReason::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        RejectionReason::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn rejection_message(reason: &RejectionReason) -> String {
    match reason {
        RejectionReason::InvalidPayload(_) => "Request payload is malformed".to_string(),
        RejectionReason::TenantNotFound => "Tenant not found".to_string(),
        RejectionReason::TenantInactive => "Tenant is not active".to_string(),
        RejectionReason::MissingSignature => "Signature header is required".to_string(),
        RejectionReason::InvalidSignature => "Signature verification failed".to_string(),
        RejectionReason::TimestampInvalid(_) => {
            "Request timestamp is outside the accepted window".to_string()
        }
        RejectionReason::DuplicateDelivery => "Request was already delivered".to_string(),
        RejectionReason::RateLimited {
            retry_after_seconds,
        } => format!("Rate limit exceeded. Retry after {}s", retry_after_seconds),
        RejectionReason::Unavailable { .. } => {
            "Service temporarily unavailable. Please retry.".to_string()
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Gate rejections are logged by the gate with full context.
        match &self {
            Self::Downstream(e) => error!(error = %e, "Admitted webhook could not be handed off"),
            Self::Unavailable { message } => error!(error = %message, "Admin operation failed"),
            Self::Unauthorized => warn!("Admin request with missing or invalid token"),
            Self::InvalidEndpoint(e) | Self::InvalidParameter(e) => {
                warn!(error = %e, "Request path rejected")
            }
            Self::Rejected(_) | Self::TenantNotFound => {}
        }

        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.public_message(),
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = self.retry_after_seconds() {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Invalid {section} configuration: {source}")]
    Validation {
        section: String,
        source: ValidationError,
    },
}
