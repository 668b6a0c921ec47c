//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mock_proxy_exchanges_total` (counter): exchanges by route kind and status
//! - `mock_proxy_exchange_duration_seconds` (histogram): head-to-end latency by route kind
//! - `mock_proxy_upstream_connections` (gauge): live upstream connections
//! - `mock_proxy_rule_reloads_total` (counter): reloads by result
//! - `mock_proxy_rules_loaded` (gauge): rules in the current table
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished exchange.
pub fn record_exchange(route: &'static str, status: u16, started: Instant) {
    metrics::counter!(
        "mock_proxy_exchanges_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("mock_proxy_exchange_duration_seconds", "route" => route)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_upstream_connections(active: u64) {
    metrics::gauge!("mock_proxy_upstream_connections").set(active as f64);
}

pub fn record_reload(success: bool) {
    let result = if success { "ok" } else { "error" };
    metrics::counter!("mock_proxy_rule_reloads_total", "result" => result).increment(1);
}

pub fn record_rules_loaded(count: usize) {
    metrics::gauge!("mock_proxy_rules_loaded").set(count as f64);
}
