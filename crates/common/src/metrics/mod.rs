//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming, recorded through the
//! `metrics` facade. The gateway installs the exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all AutoPress metrics
pub const METRICS_PREFIX: &str = "autopress";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for outbound webhook calls; n8n answers slowly when it runs inline
pub const WEBHOOK_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_webhook_dispatch_total", METRICS_PREFIX),
        Unit::Count,
        "Outbound webhook deliveries by event and outcome"
    );

    describe_histogram!(
        format!("{}_webhook_dispatch_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Outbound webhook latency in seconds"
    );

    describe_counter!(
        format!("{}_article_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Article status changes by target status"
    );

    describe_counter!(
        format!("{}_callbacks_received_total", METRICS_PREFIX),
        Unit::Count,
        "Inbound n8n callbacks by reported status"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_webhook_dispatch(event: &str, success: bool, duration_secs: f64) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_webhook_dispatch_total", METRICS_PREFIX),
        "event" => event.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_webhook_dispatch_duration_seconds", METRICS_PREFIX),
        "event" => event.to_string()
    )
    .record(duration_secs);
}

pub fn record_article_transition(status: &str) {
    counter!(
        format!("{}_article_transitions_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_callback(status: &str) {
    counter!(
        format!("{}_callbacks_received_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, WEBHOOK_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls are no-ops and must not panic
        let metrics = RequestMetrics::start("POST", "/api/articles/:id/force-process");
        metrics.finish(202);
        record_webhook_dispatch("article.generate", true, 0.2);
        record_article_transition("processing");
        record_callback("posted");
    }
}
