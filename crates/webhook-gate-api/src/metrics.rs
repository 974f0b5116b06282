//! Metrics collection and observability types for the API service.

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use webhook_gate_core::monitoring::GateMetrics;

/// Prometheus collectors for gate decisions
///
/// Each instance owns its registry, so tests can create as many as they need.
/// Endpoint names come from the request path and are not used as labels.
pub struct ServiceMetrics {
    registry: Registry,

    /// Requests by outcome (`admitted` or `rejected`)
    pub requests_total: IntCounterVec,

    /// Rejections by reason kind
    pub rejections_total: IntCounterVec,

    /// Time spent in the validation chain
    pub check_duration: Histogram,

    /// Tenant directory lookup latency by result
    pub lookup_duration: HistogramVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "webhook_gate_requests_total",
                "Webhook requests by gate outcome",
            ),
            &["outcome"],
        )?;
        let rejections_total = IntCounterVec::new(
            Opts::new(
                "webhook_gate_rejections_total",
                "Rejected webhook requests by reason",
            ),
            &["reason"],
        )?;
        let check_duration = Histogram::with_opts(
            HistogramOpts::new(
                "webhook_gate_check_duration_seconds",
                "Time spent validating one webhook",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        let lookup_duration = HistogramVec::new(
            HistogramOpts::new(
                "webhook_gate_lookup_duration_seconds",
                "Tenant directory lookup latency",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25]),
            &["result"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(rejections_total.clone()))?;
        registry.register(Box::new(check_duration.clone()))?;
        registry.register(Box::new(lookup_duration.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Arc::new(Self {
            registry,
            requests_total,
            rejections_total,
            check_duration,
            lookup_duration,
        }))
    }

    /// Render all collectors in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl GateMetrics for ServiceMetrics {
    fn record_admitted(&self, _endpoint: &str, duration: Duration) {
        self.requests_total.with_label_values(&["admitted"]).inc();
        self.check_duration.observe(duration.as_secs_f64());
    }

    fn record_rejected(&self, _endpoint: &str, reason: &str, duration: Duration) {
        self.requests_total.with_label_values(&["rejected"]).inc();
        self.rejections_total.with_label_values(&[reason]).inc();
        self.check_duration.observe(duration.as_secs_f64());
    }

    fn record_lookup(&self, duration: Duration, success: bool) {
        let result = if success { "ok" } else { "error" };
        self.lookup_duration
            .with_label_values(&[result])
            .observe(duration.as_secs_f64());
    }
}

impl fmt::Debug for ServiceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMetrics").finish_non_exhaustive()
    }
}
