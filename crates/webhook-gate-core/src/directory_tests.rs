//! Tests for tenant records and the secret container.

use super::*;

#[test]
fn test_secret_debug_is_redacted() {
    let secret = SecretValue::from_string("whsec-super-secret".to_string());
    let debug = format!("{:?}", secret);
    assert!(!debug.contains("whsec-super-secret"));
    assert!(debug.contains("[REDACTED]"));
    assert!(debug.contains("18"));
}

#[test]
fn test_secret_exposes_bytes() {
    let secret = SecretValue::from_bytes(vec![1, 2, 3]);
    assert_eq!(secret.expose_bytes(), &[1, 2, 3]);
    assert_eq!(secret.len(), 3);
    assert!(!secret.is_empty());
}

/// Verify that the record-level Debug output does not leak the secret.
#[test]
fn test_record_debug_is_redacted() {
    let record = TenantRecord::new(
        TenantId::new("acme-corp").unwrap(),
        SecretValue::from_string("whsec-super-secret".to_string()),
    );
    assert!(!format!("{:?}", record).contains("whsec-super-secret"));
}

#[test]
fn test_rate_limit_override_falls_back_to_default() {
    let tickets = EndpointId::new("tickets").unwrap();
    let orders = EndpointId::new("orders").unwrap();
    let record = TenantRecord::new(
        TenantId::new("acme-corp").unwrap(),
        SecretValue::from_string("s".to_string()),
    )
    .with_rate_limit(tickets.clone(), RateLimitPolicy::new(5, 10).unwrap());

    let default = RateLimitPolicy::default();
    assert_eq!(record.rate_limit_for(&tickets, default).limit, 5);
    assert_eq!(record.rate_limit_for(&orders, default), default);
}

#[test]
fn test_inactive_builder_clears_flag() {
    let record = TenantRecord::new(
        TenantId::new("acme-corp").unwrap(),
        SecretValue::from_string("s".to_string()),
    );
    assert!(record.active);
    assert!(!record.inactive().active);
}

#[test]
fn test_only_unavailable_is_transient() {
    assert!(DirectoryError::Unavailable {
        message: "timeout".to_string()
    }
    .is_transient());
    assert!(!DirectoryError::NotFound {
        tenant_id: "acme-corp".to_string()
    }
    .is_transient());
}
