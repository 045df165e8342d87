//! Host-facing driver: one `save_block` call per finalized block.
//!
//! # Responsibilities
//! - Run the data handler and encoder for each block
//! - Hand payload + block hash to the delivery engine and wait for the ack
//! - Forward new consumer connections to the engine's slots
//! - Shut down the engine and the transport

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::hex;
use tokio::sync::Mutex;

use crate::block::{codec, DataHandler, SaveBlockArgs};
use crate::delivery::{DeliveryEngine, DeliveryError, DeliveryReport, DeliveryRequest};
use crate::driver::types::{DriverError, DriverResult, DriverState, Transport};
use crate::net::connection::DuplexConnection;

/// Collects the driver's dependencies; every one of them is required.
#[derive(Default)]
pub struct DriverBuilder {
    data_handler: Option<Arc<dyn DataHandler>>,
    engine: Option<Arc<DeliveryEngine>>,
    transport: Option<Box<dyn Transport>>,
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_handler(mut self, data_handler: Arc<dyn DataHandler>) -> Self {
        self.data_handler = Some(data_handler);
        self
    }

    pub fn engine(mut self, engine: Arc<DeliveryEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> DriverResult<Driver> {
        let data_handler = self.data_handler.ok_or(DriverError::MissingDataHandler)?;
        let transport = self.transport.ok_or(DriverError::MissingTransport)?;
        let engine = self.engine.ok_or(DriverError::MissingEngine)?;

        Ok(Driver {
            data_handler,
            engine,
            transport: Mutex::new(Some(transport)),
            closed: AtomicBool::new(false),
        })
    }
}

/// Driver facade between the host and the delivery engine.
pub struct Driver {
    data_handler: Arc<dyn DataHandler>,
    engine: Arc<DeliveryEngine>,
    transport: Mutex<Option<Box<dyn Transport>>>,
    closed: AtomicBool,
}

impl Driver {
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    /// Process, encode and deliver one block.
    ///
    /// Returns once the consumer acknowledged the block hash. Processing and
    /// encoding failures are returned as fatal errors; the block is never
    /// skipped silently.
    pub async fn save_block(&self, args: &SaveBlockArgs) -> DriverResult<DeliveryReport> {
        if self.is_closed() {
            return Err(DriverError::Closed);
        }

        let block_result = self.data_handler.process_data(args).map_err(|source| {
            let header_hash = hex::encode(&args.header_hash);
            tracing::error!(
                header_hash = %header_hash,
                error = %source,
                "SaveBlock failed. Could not process block"
            );
            DriverError::Process {
                header_hash,
                source,
            }
        })?;

        let payload = codec::encode(&block_result).map_err(|e| {
            tracing::error!(error = %e, "Could not encode block result to binary data");
            DriverError::Encode(e)
        })?;

        let request = DeliveryRequest::new(payload, block_result.block.hash);
        tracing::debug!(
            number = block_result.block.number,
            payload_len = request.payload().len(),
            "Delivering block"
        );

        self.engine.deliver(&request).await.map_err(|e| match e {
            DeliveryError::Closed => DriverError::Closed,
        })
    }

    /// Called when a block is reverted. The consumer tracks reorgs itself.
    pub async fn revert_indexed_block(&self, header_hash: &[u8]) -> DriverResult<()> {
        tracing::debug!(header_hash = %hex::encode(header_hash), "Revert ignored");
        Ok(())
    }

    /// Called when a block becomes final in the host's view.
    pub async fn finalized_block(&self, header_hash: &[u8]) -> DriverResult<()> {
        tracing::trace!(header_hash = %hex::encode(header_hash), "Finalized block noted");
        Ok(())
    }

    /// Install a new outbound connection (or clear it with `None`).
    pub async fn set_sender(&self, connection: Option<Arc<dyn DuplexConnection>>) {
        self.engine.set_sender(connection).await;
    }

    /// Install a new inbound connection (or clear it with `None`).
    pub async fn set_receiver(&self, connection: Option<Arc<dyn DuplexConnection>>) {
        self.engine.set_receiver(connection).await;
    }

    pub async fn state(&self) -> DriverState {
        if self.is_closed() {
            return DriverState::Closed;
        }
        DriverState::from_slots(
            self.engine.sender().is_populated().await,
            self.engine.receiver().is_populated().await,
        )
    }

    pub fn engine(&self) -> &Arc<DeliveryEngine> {
        &self.engine
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close both consumer connections and stop the transport.
    ///
    /// In-flight `save_block` calls return `DriverError::Closed`. Calling this
    /// twice is harmless.
    pub async fn shutdown(&self) -> DriverResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.engine.shutdown().await;

        let transport = self.transport.lock().await.take();
        if let Some(transport) = transport {
            transport.close().await?;
        }

        tracing::info!("Driver closed");
        Ok(())
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("engine", &self.engine)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
