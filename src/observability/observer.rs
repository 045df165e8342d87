//! Delivery event sink.
//!
//! The engine and its slots report through a `DeliveryObserver` handed to
//! them at construction. `TracingObserver` is the production sink: structured
//! `tracing` events plus the Prometheus metrics in `metrics.rs`.

use crate::delivery::types::{AttemptOutcome, DeliveryReport, Direction};
use crate::net::connection::{ConnectionError, Frame};
use crate::observability::metrics;

/// Receives every notable delivery and connection event.
///
/// All methods have empty defaults so test observers only override what they count.
pub trait DeliveryObserver: Send + Sync {
    /// A slot's content changed. `populated` is false for a disconnect.
    fn connection_replaced(&self, _direction: Direction, _generation: u64, _populated: bool) {}

    /// Closing a replaced connection failed.
    fn close_failed(&self, _direction: Direction, _error: &ConnectionError) {}

    /// Writing the payload failed; the engine now waits for a new sender.
    fn write_failed(&self, _attempt: u64, _error: &ConnectionError) {}

    /// Reading the acknowledgment failed; the engine now waits for a new receiver.
    fn read_failed(&self, _attempt: u64, _error: &ConnectionError) {}

    /// A frame was read but it is not the expected acknowledgment.
    fn ack_mismatch(&self, _attempt: u64, _received: &Frame, _expected: &[u8]) {}

    /// One cycle finished with the given outcome.
    fn attempt_finished(&self, _attempt: u64, _outcome: AttemptOutcome) {}

    /// A delivery was acknowledged.
    fn delivered(&self, _report: &DeliveryReport) {}
}

/// Observer that writes structured logs and records metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DeliveryObserver for TracingObserver {
    fn connection_replaced(&self, direction: Direction, generation: u64, populated: bool) {
        tracing::info!(%direction, generation, populated, "Connection slot updated");
        metrics::record_connection_replaced(direction, populated);
    }

    fn close_failed(&self, direction: Direction, error: &ConnectionError) {
        tracing::error!(%direction, error = %error, "Failed to close replaced connection");
        metrics::record_close_error(direction);
    }

    fn write_failed(&self, attempt: u64, error: &ConnectionError) {
        tracing::warn!(
            attempt,
            error = %error,
            "Could not send block data, waiting for new connection"
        );
    }

    fn read_failed(&self, attempt: u64, error: &ConnectionError) {
        tracing::warn!(
            attempt,
            error = %error,
            "Could not receive acknowledge data, waiting for new connection"
        );
    }

    fn ack_mismatch(&self, attempt: u64, received: &Frame, expected: &[u8]) {
        tracing::warn!(
            attempt,
            kind = %received.kind,
            received_len = received.data.len(),
            expected_len = expected.len(),
            "Acknowledgment does not match, retrying"
        );
    }

    fn attempt_finished(&self, attempt: u64, outcome: AttemptOutcome) {
        tracing::trace!(attempt, outcome = outcome.as_str(), "Delivery attempt finished");
        metrics::record_attempt(outcome);
    }

    fn delivered(&self, report: &DeliveryReport) {
        tracing::debug!(
            attempts = report.attempts,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Block acknowledged"
        );
        metrics::record_delivery(report);
    }
}
