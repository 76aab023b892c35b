//! Metrics and observability utilities
//!
//! Prometheus metrics for the gateway and the fetch pipeline, all named
//! with the `potd_` prefix.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Picture of the Day metrics
pub const METRICS_PREFIX: &str = "potd";

/// Histogram buckets for API request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
];

/// Buckets for upstream calls (source APIs, language model, image downloads)
pub const UPSTREAM_BUCKETS: &[f64] = &[
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 60s
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
        format!("{}_fetches_total", METRICS_PREFIX),
        Unit::Count,
        "Source fetches by outcome"
    );

    describe_histogram!(
        format!("{}_fetch_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Source fetch latency in seconds"
    );

    describe_counter!(
        format!("{}_enrichment_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Language model calls by stage and outcome"
    );

    describe_histogram!(
        format!("{}_enrichment_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Language model call latency in seconds"
    );

    describe_counter!(
        format!("{}_image_downloads_total", METRICS_PREFIX),
        Unit::Count,
        "Image downloads by outcome"
    );

    describe_counter!(
        format!("{}_pictures_deleted_total", METRICS_PREFIX),
        Unit::Count,
        "Pictures removed by retention cleanup"
    );

    tracing::info!("Metrics registered");
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
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

/// Record one adapter fetch
pub fn record_fetch(source: &str, duration_secs: f64, success: bool) {
    counter!(
        format!("{}_fetches_total", METRICS_PREFIX),
        "source" => source.to_string(),
        "status" => outcome(success)
    )
    .increment(1);

    histogram!(
        format!("{}_fetch_duration_seconds", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .record(duration_secs);
}

/// Record one language model call; `stage` is e.g. "simplify" or "links"
pub fn record_enrichment(stage: &str, duration_secs: f64, success: bool) {
    counter!(
        format!("{}_enrichment_requests_total", METRICS_PREFIX),
        "stage" => stage.to_string(),
        "status" => outcome(success)
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_enrichment_duration_seconds", METRICS_PREFIX),
            "stage" => stage.to_string()
        )
        .record(duration_secs);
    }
}

pub fn record_image_download(source: &str, success: bool) {
    counter!(
        format!("{}_image_downloads_total", METRICS_PREFIX),
        "source" => source.to_string(),
        "status" => outcome(success)
    )
    .increment(1);
}

pub fn record_cleanup(source: &str, deleted: u64) {
    counter!(
        format!("{}_pictures_deleted_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(deleted);
}
