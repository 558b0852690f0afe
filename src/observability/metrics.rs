//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_ingest_total` (counter): Send outcomes by `outcome`
//! - `relay_events_relayed_total` (counter): status events written to Watch streams
//! - `relay_gateway_requests_total` (counter): REST requests by `route`, `status`
//! - `relay_active_subscriptions` (gauge): registered hub subscribers
//! - `relay_publish_wait_seconds` (histogram): time a publish waited for delivery
//!
//! Recording is a no-op until [`init_metrics`] installs a recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_ingest(outcome: &'static str) {
    counter!("relay_ingest_total", "outcome" => outcome).increment(1);
}

pub fn record_relayed() {
    counter!("relay_events_relayed_total").increment(1);
}

pub fn record_gateway_request(route: &'static str, status: u16) {
    counter!("relay_gateway_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
}

pub fn set_active_subscriptions(count: usize) {
    gauge!("relay_active_subscriptions").set(count as f64);
}

pub fn record_publish_wait(started: Instant) {
    histogram!("relay_publish_wait_seconds").record(started.elapsed().as_secs_f64());
}
