//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_rate_limited_total` (counter): rejections by tier
//! - `gateway_upstream_outcomes_total` (counter): upstream results by outcome
//! - `gateway_upstream_duration_seconds` (histogram): upstream call latency
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(tier: &'static str) {
    counter!("gateway_rate_limited_total", "tier" => tier).increment(1);
}

pub fn record_upstream(outcome: &'static str, start: Instant) {
    counter!("gateway_upstream_outcomes_total", "outcome" => outcome).increment(1);
    histogram!("gateway_upstream_duration_seconds").record(start.elapsed().as_secs_f64());
}
