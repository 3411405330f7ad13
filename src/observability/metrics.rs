//! Metrics collection and exposition.
//!
//! # Metrics
//! - `status_proxy_requests_total` (counter): requests by method, status, inspected
//! - `status_proxy_request_duration_seconds` (histogram): time to response head
//! - `status_proxy_status_rewrites_total` (counter): statuses taken from the body
//! - `status_proxy_transcode_errors_total` (counter): aborted transcoded bodies
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed response head.
pub fn record_request(method: &str, status: u16, inspected: bool, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("inspected", inspected.to_string()),
    ];
    metrics::counter!("status_proxy_requests_total", &labels).increment(1);
    metrics::histogram!("status_proxy_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record a status code taken from the response body.
pub fn record_status_rewrite(status: u16) {
    metrics::counter!("status_proxy_status_rewrites_total", "status" => status.to_string())
        .increment(1);
}

/// Record a transcoded body that had to be aborted.
pub fn record_transcode_error() {
    metrics::counter!("status_proxy_transcode_errors_total").increment(1);
}
