//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_delivery_attempts_total` (counter): cycles by outcome
//! - `relay_deliveries_total` (counter): acknowledged deliveries
//! - `relay_delivery_duration_seconds` (histogram): call-to-ack latency
//! - `relay_connection_replacements_total` (counter): slot replacements by direction
//! - `relay_connection_up` (gauge): 1 while a slot holds a connection
//! - `relay_connection_close_errors_total` (counter): failed closes by direction
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::delivery::types::{AttemptOutcome, DeliveryReport, Direction};

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_attempt(outcome: AttemptOutcome) {
    counter!("relay_delivery_attempts_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_delivery(report: &DeliveryReport) {
    counter!("relay_deliveries_total").increment(1);
    histogram!("relay_delivery_duration_seconds").record(report.elapsed.as_secs_f64());
}

pub fn record_connection_replaced(direction: Direction, populated: bool) {
    counter!("relay_connection_replacements_total", "direction" => direction.as_str()).increment(1);
    gauge!("relay_connection_up", "direction" => direction.as_str())
        .set(if populated { 1.0 } else { 0.0 });
}

pub fn record_close_error(direction: Direction) {
    counter!("relay_connection_close_errors_total", "direction" => direction.as_str()).increment(1);
}
