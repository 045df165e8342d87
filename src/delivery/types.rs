//! Delivery request, outcome and error types.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Which side of the consumer link a slot serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Outbound: payload frames are written here.
    Sender,
    /// Inbound: acknowledgment frames are read here.
    Receiver,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Sender => "sender",
            Direction::Receiver => "receiver",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload and the exact bytes expected back as its acknowledgment.
///
/// Immutable once built; the engine only borrows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    payload: Vec<u8>,
    ack_token: Vec<u8>,
}

impl DeliveryRequest {
    pub fn new(payload: Vec<u8>, ack_token: Vec<u8>) -> Self {
        Self { payload, ack_token }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn ack_token(&self) -> &[u8] {
        &self.ack_token
    }
}

/// Result of a single write-then-read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Write and read succeeded and the binary frame matched the token.
    Acknowledged,
    /// Write and read succeeded but the frame was not the expected token.
    Mismatch,
    /// The write or the read failed.
    Faulted,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Acknowledged => "acknowledged",
            AttemptOutcome::Mismatch => "mismatch",
            AttemptOutcome::Faulted => "faulted",
        }
    }
}

/// Summary of a completed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Number of write/read cycles performed, including the successful one.
    pub attempts: u64,
    /// Wall time from the call to the acknowledgment.
    pub elapsed: Duration,
}

/// Errors surfaced by the delivery engine.
///
/// Transport faults and mismatches are retried internally and never appear here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The engine was shut down before or during the delivery.
    #[error("delivery engine is closed")]
    Closed,
}

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Point-in-time view of the engine, served by the status route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub sender_connected: bool,
    pub receiver_connected: bool,
    pub deliveries_completed: u64,
    pub attempts_total: u64,
    pub in_flight: u64,
    pub closed: bool,
}
