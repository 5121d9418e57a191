//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): calls by outcome and status
//! - `proxy_auth_failures_total` (counter): failed secret checks
//! - `proxy_blacklist_additions_total` (counter): sources newly blacklisted
//! - `proxy_upstream_duration_seconds` (histogram): outbound call latency
//!
//! Updates go through the `metrics` facade and are no-ops until a recorder
//! is installed by `init_metrics`.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(outcome: &'static str, status: u16) {
    counter!("proxy_requests_total", "outcome" => outcome, "status" => status.to_string())
        .increment(1);
}

pub fn record_auth_failure() {
    counter!("proxy_auth_failures_total").increment(1);
}

pub fn record_blacklist_addition() {
    counter!("proxy_blacklist_additions_total").increment(1);
}

pub fn record_upstream_latency(start: Instant, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    histogram!("proxy_upstream_duration_seconds", "result" => result)
        .record(start.elapsed().as_secs_f64());
}
