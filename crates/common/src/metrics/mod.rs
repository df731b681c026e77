//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all LabTrack metrics
pub const METRICS_PREFIX: &str = "labtrack";

/// SLO-aligned histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
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
        format!("{}_samples_created_total", METRICS_PREFIX),
        Unit::Count,
        "Samples registered, by tenant schema"
    );

    describe_counter!(
        format!("{}_results_created_total", METRICS_PREFIX),
        Unit::Count,
        "Sample results recorded, by tenant schema"
    );

    describe_counter!(
        format!("{}_status_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Sample status changes, by target status"
    );

    describe_counter!(
        format!("{}_centers_provisioned_total", METRICS_PREFIX),
        Unit::Count,
        "Centers created together with their schema"
    );

    describe_counter!(
        format!("{}_schema_migrations_total", METRICS_PREFIX),
        Unit::Count,
        "Tenant schema migrations, by outcome"
    );

    describe_counter!(
        format!("{}_logins_total", METRICS_PREFIX),
        Unit::Count,
        "Login attempts, by outcome"
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

fn outcome(success: bool) -> &'static str {
    if success { "success" } else { "error" }
}

pub fn record_sample_created(schema: &str) {
    counter!(
        format!("{}_samples_created_total", METRICS_PREFIX),
        "schema" => schema.to_string()
    )
    .increment(1);
}

pub fn record_result_created(schema: &str) {
    counter!(
        format!("{}_results_created_total", METRICS_PREFIX),
        "schema" => schema.to_string()
    )
    .increment(1);
}

pub fn record_status_transition(schema: &str, status: &str) {
    counter!(
        format!("{}_status_transitions_total", METRICS_PREFIX),
        "schema" => schema.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_center_provisioned() {
    counter!(format!("{}_centers_provisioned_total", METRICS_PREFIX)).increment(1);
}

pub fn record_schema_migration(schema: &str, success: bool) {
    counter!(
        format!("{}_schema_migrations_total", METRICS_PREFIX),
        "schema" => schema.to_string(),
        "outcome" => outcome(success)
    )
    .increment(1);
}

pub fn record_login(success: bool) {
    counter!(
        format!("{}_logins_total", METRICS_PREFIX),
        "outcome" => outcome(success)
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper must be a no-op
        let metrics = RequestMetrics::start("GET", "/api/samples/");
        metrics.finish(200);
        record_sample_created("acme");
        record_schema_migration("acme", false);
        record_login(true);
    }
}
