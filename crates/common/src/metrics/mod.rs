//! Metrics and observability utilities
//!
//! Prometheus metrics with latency histograms and standardized naming.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all viewer metrics
pub const METRICS_PREFIX: &str = "viewer";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
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
        format!("{}_solr_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search index queries"
    );

    describe_histogram!(
        format!("{}_solr_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search index query latency in seconds"
    );

    describe_counter!(
        format!("{}_iiif_urls_resolved_total", METRICS_PREFIX),
        Unit::Count,
        "IIIF urls resolved, by kind"
    );

    describe_counter!(
        format!("{}_download_jobs_total", METRICS_PREFIX),
        Unit::Count,
        "Download job status transitions"
    );

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

/// Helper to record search index queries
pub fn record_solr_query(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_solr_queries_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    histogram!(format!("{}_solr_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record resolved IIIF urls (`image`, `info`, `thumbnail`, `watermark`, ...)
pub fn record_iiif_url(kind: &str) {
    counter!(
        format!("{}_iiif_urls_resolved_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Helper to record download job status changes
pub fn record_download_job(job_type: &str, status: &str) {
    counter!(
        format!("{}_download_jobs_total", METRICS_PREFIX),
        "type" => job_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    let name = if hit { "cache_hits_total" } else { "cache_misses_total" };
    counter!(
        format!("{}_{}", METRICS_PREFIX, name),
        "cache" => cache_name.to_string()
    )
    .increment(1);
}
