//! HMAC-SHA256 request signatures.
//!
//! Senders sign the exact raw request body with their tenant secret and send
//! the lowercase hex digest in a header. Verification recomputes the digest
//! and compares the two hex strings in constant time.
//!
//! Neither function ever logs or returns the secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded SHA-256 digest
pub const SIGNATURE_HEX_LENGTH: usize = 64;

/// Prefix some providers put in front of the hex digest (`sha256=<hex>`)
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the lowercase hex HMAC-SHA256 of `body` keyed by `secret`
///
/// # Examples
///
/// ```rust
/// use webhook_gate_core::signature::{compute_signature, verify_signature};
///
/// let sig = compute_signature(b"tenant-secret", br#"{"tenant_id":"acme-corp"}"#);
/// assert_eq!(sig.len(), 64);
/// assert!(verify_signature(b"tenant-secret", br#"{"tenant_id":"acme-corp"}"#, &sig));
/// ```
pub fn compute_signature(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a provided hex signature against `body`
///
/// Returns `false` for any length mismatch, non-canonical encoding (including
/// uppercase hex) or digest mismatch. This function never errors on the
/// content of `provided_hex`.
pub fn verify_signature(secret: &[u8], body: &[u8], provided_hex: &str) -> bool {
    let provided = provided_hex.as_bytes();

    // Length is public information; only the content comparison must be
    // constant time.
    if provided.len() != SIGNATURE_HEX_LENGTH {
        return false;
    }

    let expected = compute_signature(secret, body);
    constant_time_eq(expected.as_bytes(), provided)
}

/// Strip the optional `sha256=` prefix and surrounding whitespace from a
/// signature header value
pub fn normalize_signature_header(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed.strip_prefix(SIGNATURE_PREFIX).unwrap_or(trimmed)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
