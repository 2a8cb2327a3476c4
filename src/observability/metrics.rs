//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ingress_router_rebuilds_total` (counter): published route tables
//! - `ingress_router_rebuild_failures_total` (counter): abandoned rebuilds
//! - `ingress_router_rebuild_duration_seconds` (histogram)
//! - `ingress_router_hosts` / `ingress_router_routes` (gauge): size of the current table
//! - `ingress_router_signals_dropped_total` (counter): signals absorbed by a full channel
//! - `ingress_router_matches_total` (counter): lookups by result
//! - `ingress_router_requests_total` (counter): proxied requests by method, status
//! - `ingress_router_request_duration_seconds` (histogram)
//!
//! All recorders are no-ops until `init_metrics` installs the exporter.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rebuild(elapsed: Duration, hosts: usize, routes: usize) {
    counter!("ingress_router_rebuilds_total").increment(1);
    histogram!("ingress_router_rebuild_duration_seconds").record(elapsed.as_secs_f64());
    gauge!("ingress_router_hosts").set(hosts as f64);
    gauge!("ingress_router_routes").set(routes as f64);
}

pub fn record_rebuild_failure() {
    counter!("ingress_router_rebuild_failures_total").increment(1);
}

pub fn record_signal_dropped() {
    counter!("ingress_router_signals_dropped_total").increment(1);
}

pub fn record_match(found: bool) {
    let result = if found { "found" } else { "not_found" };
    counter!("ingress_router_matches_total", "result" => result).increment(1);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "ingress_router_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("ingress_router_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
