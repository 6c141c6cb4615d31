//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Noe Ops metrics
pub const METRICS_PREFIX: &str = "noe";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 500ms (upstream calls dominate)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms - P99 target
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s - upstream timeout
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
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

    // Costing metrics
    describe_counter!(
        format!("{}_cost_calculations_total", METRICS_PREFIX),
        Unit::Count,
        "Total recipe cost calculations"
    );

    describe_histogram!(
        format!("{}_recipe_ingredient_count", METRICS_PREFIX),
        Unit::Count,
        "Ingredients per costed recipe"
    );

    // Upstream metrics
    describe_counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total requests to Odoo and Toast"
    );

    describe_histogram!(
        format!("{}_upstream_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Odoo and Toast request latency in seconds"
    );

    describe_counter!(
        format!("{}_upstream_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total failed requests to Odoo and Toast"
    );

    // Session metrics
    describe_counter!(
        format!("{}_logins_total", METRICS_PREFIX),
        Unit::Count,
        "Login attempts by outcome"
    );

    describe_counter!(
        format!("{}_sessions_expired_total", METRICS_PREFIX),
        Unit::Count,
        "Sessions removed by the expiry sweep"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
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

/// Helper to record a recipe cost calculation
pub fn record_cost_calculation(ingredient_count: usize) {
    counter!(format!("{}_cost_calculations_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_recipe_ingredient_count", METRICS_PREFIX))
        .record(ingredient_count as f64);
}

/// Helper to record an Odoo or Toast call
pub fn record_upstream(service: &str, operation: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        "service" => service.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_upstream_duration_seconds", METRICS_PREFIX),
            "service" => service.to_string(),
            "operation" => operation.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_upstream_errors_total", METRICS_PREFIX),
            "service" => service.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }
}

/// Helper to record a login attempt
pub fn record_login(success: bool) {
    counter!(
        format!("{}_logins_total", METRICS_PREFIX),
        "outcome" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

/// Helper to record swept sessions
pub fn record_sessions_expired(count: usize) {
    counter!(format!("{}_sessions_expired_total", METRICS_PREFIX)).increment(count as u64);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        assert!(LATENCY_BUCKETS.contains(&0.050));
        assert!(LATENCY_BUCKETS.contains(&0.500));
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper must be a no-op
        let metrics = RequestMetrics::start("GET", "/api/recipes");
        metrics.finish(200);
        record_cost_calculation(3);
        record_upstream("odoo", "search_products", 0.2, true);
        record_upstream("toast", "orders", 0.0, false);
        record_login(false);
        record_sessions_expired(2);
        record_cache(true, "odoo_products");
    }
}
