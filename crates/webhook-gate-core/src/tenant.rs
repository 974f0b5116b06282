//! Tenant resolution from raw webhook payloads.
//!
//! The tenant id is read from the JSON body before any cryptographic work is
//! done. Until the signature has been verified against that tenant's secret the
//! id is only a claim.

use crate::TenantId;
use serde_json::Value;

/// Name of the payload field carrying the tenant id
pub const TENANT_ID_FIELD: &str = "tenant_id";

/// Reasons a payload cannot be accepted before any tenant-specific check runs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Payload is not valid JSON: {message}")]
    MalformedJson { message: String },

    #[error("Payload must be a JSON object")]
    NotAnObject,

    #[error("Payload is missing required field '{field}'")]
    MissingField { field: String },

    #[error("Payload field '{field}' is invalid: {message}")]
    InvalidField { field: String, message: String },
}

impl PayloadError {
    /// Short machine-readable label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedJson { .. } => "malformed_json",
            Self::NotAnObject => "not_an_object",
            Self::MissingField { .. } => "missing_field",
            Self::InvalidField { .. } => "invalid_field",
        }
    }
}

/// A parsed payload with its claimed tenant
///
/// Holding on to the parsed document lets later stages read further fields
/// without parsing the body a second time.
#[derive(Debug, Clone)]
pub struct ParsedPayload {
    pub tenant_id: TenantId,
    pub document: Value,
}

impl ParsedPayload {
    /// Read a required string field from the top-level object
    pub fn string_field(&self, field: &str) -> Result<&str, PayloadError> {
        string_field(&self.document, field)
    }
}

/// Parse the raw body and extract the claimed tenant id
pub fn parse_payload(raw_body: &[u8]) -> Result<ParsedPayload, PayloadError> {
    let document: Value =
        serde_json::from_slice(raw_body).map_err(|e| PayloadError::MalformedJson {
            message: e.to_string(),
        })?;

    if !document.is_object() {
        return Err(PayloadError::NotAnObject);
    }

    let raw_id = string_field(&document, TENANT_ID_FIELD)?;
    let tenant_id = TenantId::new(raw_id).map_err(|e| PayloadError::InvalidField {
        field: TENANT_ID_FIELD.to_string(),
        message: e.to_string(),
    })?;

    Ok(ParsedPayload {
        tenant_id,
        document,
    })
}

/// Extract and validate the `tenant_id` claim from a raw payload
///
/// # Examples
///
/// ```rust
/// use webhook_gate_core::tenant::extract_tenant_id;
///
/// let id = extract_tenant_id(br#"{"tenant_id":"acme-corp"}"#).unwrap();
/// assert_eq!(id.as_str(), "acme-corp");
/// assert!(extract_tenant_id(br#"{"tenant_id":"ACME"}"#).is_err());
/// ```
pub fn extract_tenant_id(raw_body: &[u8]) -> Result<TenantId, PayloadError> {
    parse_payload(raw_body).map(|parsed| parsed.tenant_id)
}

fn string_field<'a>(document: &'a Value, field: &str) -> Result<&'a str, PayloadError> {
    match document.get(field) {
        None | Some(Value::Null) => Err(PayloadError::MissingField {
            field: field.to_string(),
        }),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(PayloadError::InvalidField {
            field: field.to_string(),
            message: "expected a string".to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "tenant_tests.rs"]
mod tests;
