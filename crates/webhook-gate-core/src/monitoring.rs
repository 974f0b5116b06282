//! Metrics collection for the validation chain.
//!
//! The gate reports through the [`GateMetrics`] trait; the HTTP layer provides
//! a Prometheus-backed implementation. Recording is best-effort and never
//! affects an admission decision.
//!
//! # Examples
//!
//! ```rust
//! use webhook_gate_core::monitoring::{GateMetrics, NoOpGateMetrics};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let metrics: Arc<dyn GateMetrics> = Arc::new(NoOpGateMetrics);
//! metrics.record_admitted("tickets", Duration::from_millis(3));
//! metrics.record_rejected("tickets", "invalid_signature", Duration::from_millis(1));
//! ```

use std::time::Duration;

/// Metrics sink for gate decisions
///
/// All methods take `&self` so one collector can be shared through
/// `Arc<dyn GateMetrics>` across tasks.
pub trait GateMetrics: Send + Sync {
    /// Record an admitted request and the time spent validating it
    fn record_admitted(&self, endpoint: &str, duration: Duration);

    /// Record a rejected request
    ///
    /// `reason` is the stable machine-readable rejection kind, e.g.
    /// `rate_limited` or `timestamp_invalid`.
    fn record_rejected(&self, endpoint: &str, reason: &str, duration: Duration);

    /// Record a tenant directory lookup
    fn record_lookup(&self, duration: Duration, success: bool);
}

/// Collector that discards every observation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpGateMetrics;

impl GateMetrics for NoOpGateMetrics {
    fn record_admitted(&self, _endpoint: &str, _duration: Duration) {}

    fn record_rejected(&self, _endpoint: &str, _reason: &str, _duration: Duration) {}

    fn record_lookup(&self, _duration: Duration, _success: bool) {}
}
