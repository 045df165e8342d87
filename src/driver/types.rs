//! Driver errors, lifecycle state and the transport seam.

use async_trait::async_trait;
use thiserror::Error;

use crate::block::{CodecError, ProcessError};

/// Errors returned by the driver facade.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Built without a data handler.
    #[error("received nil input value: data handler")]
    MissingDataHandler,

    /// Built without a transport.
    #[error("received nil input value: transport")]
    MissingTransport,

    /// Built without a delivery engine.
    #[error("received nil input value: delivery engine")]
    MissingEngine,

    /// The block could not be turned into a record. Fatal for the block.
    #[error("could not process block {header_hash}: {source}")]
    Process {
        header_hash: String,
        #[source]
        source: ProcessError,
    },

    /// The record could not be encoded. Fatal for the block.
    #[error(transparent)]
    Encode(#[from] CodecError),

    /// The driver was shut down.
    #[error("driver is closed")]
    Closed,

    /// Stopping the transport failed.
    #[error("transport shutdown failed: {0}")]
    Transport(String),
}

impl DriverError {
    /// Whether the error means the block itself is broken, as opposed to the
    /// driver being misconfigured or stopped.
    pub fn is_fatal_for_block(&self) -> bool {
        matches!(self, DriverError::Process { .. } | DriverError::Encode(_))
    }
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Lifecycle state of the driver as seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No consumer connection installed yet.
    Constructed,
    SenderReady,
    ReceiverReady,
    BothReady,
    /// Terminal.
    Closed,
}

impl DriverState {
    pub fn from_slots(sender: bool, receiver: bool) -> Self {
        match (sender, receiver) {
            (false, false) => DriverState::Constructed,
            (true, false) => DriverState::SenderReady,
            (false, true) => DriverState::ReceiverReady,
            (true, true) => DriverState::BothReady,
        }
    }
}

/// The listening side that produces connections for the driver.
///
/// The driver only needs to stop it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn close(&self) -> Result<(), DriverError>;
}
