//! Duplex connection abstraction and connection identity.
//!
//! # Responsibilities
//! - Define the `DuplexConnection` seam the delivery engine talks to
//! - Define the frame model read back from a connection
//! - Generate unique connection IDs for tracing

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Kind of a data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameKind::Text => f.write_str("text"),
            FrameKind::Binary => f.write_str("binary"),
        }
    }
}

/// A single data frame read from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: FrameKind::Binary,
            data: data.into(),
        }
    }

    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: FrameKind::Text,
            data: data.into(),
        }
    }

    pub fn is_binary(&self) -> bool {
        self.kind == FrameKind::Binary
    }
}

/// Errors raised by a connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// The peer closed the connection or it was closed locally.
    #[error("connection closed")]
    Closed,

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A close handshake did not finish in time.
    #[error("close timed out after {0} ms")]
    CloseTimeout(u64),
}

/// A bidirectional, message-framed byte stream with an explicit close.
///
/// Methods take `&self`: a connection is owned by its slot and borrowed by
/// the engine for the duration of one call, so implementations synchronize
/// internally.
#[async_trait]
pub trait DuplexConnection: Send + Sync + 'static {
    /// Write one binary frame.
    async fn write(&self, payload: &[u8]) -> Result<(), ConnectionError>;

    /// Read the next data frame. Control frames are never returned.
    async fn read(&self) -> Result<Frame, ConnectionError>;

    /// Close the connection.
    async fn close(&self) -> Result<(), ConnectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn frame_constructors() {
        assert!(Frame::binary(vec![1, 2]).is_binary());
        assert!(!Frame::text("ack").is_binary());
        assert_eq!(Frame::text("ack").data, b"ack".to_vec());
    }
}
