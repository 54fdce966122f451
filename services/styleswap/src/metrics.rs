//! Prometheus metrics exposition
//!
//! Metrics recorded by this binary:
//!
//! - `http_requests_total` (counter): labels `status`, `method`
//! - `http_request_duration_seconds` (histogram): label `status`
//! - `generation_duration_seconds` (histogram): label `result`
//!
//! The library crates add `generation_attempts_total`, `generation_dispatch_total`,
//! `catalog_reads_total` and `catalog_background_refresh_total`.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const REQUEST_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Generation calls run far longer than ordinary requests.
const GENERATION_BUCKETS: &[f64] = &[1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            REQUEST_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full("generation_duration_seconds".to_string()),
            GENERATION_BUCKETS,
        )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed HTTP request with status code and method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("http_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!("http_request_duration_seconds", "status" => status_str)
        .record(duration_secs);
}

/// Record how long one `/generate` dispatch took.
pub fn record_generation(result: &'static str, duration_secs: f64) {
    metrics::histogram!("generation_duration_seconds", "result" => result).record(duration_secs);
}

/// Middleware recording every request.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    record_request(
        response.status().as_u16(),
        &method,
        started.elapsed().as_secs_f64(),
    );
    response
}
