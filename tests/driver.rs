//! Driver facade: construction, block processing and lifecycle.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use block_relay::block::{codec, BlockProcessor, BlockResult, DataHandler, ProcessError, SaveBlockArgs};
use block_relay::driver::{Driver, DriverError, DriverState};
use block_relay::net::Frame;

mod common;
use common::{block_args, engine, wait_until, within, ConnectionStub, TransportStub};

const LONG: Duration = Duration::from_secs(5);

struct RejectingHandler;

impl DataHandler for RejectingHandler {
    fn process_data(&self, _args: &SaveBlockArgs) -> Result<BlockResult, ProcessError> {
        Err(ProcessError::EmptyHeaderHash)
    }
}

fn driver_with(handler: Arc<dyn DataHandler>) -> (Driver, Arc<std::sync::atomic::AtomicU64>) {
    let (engine, _) = engine();
    let transport = TransportStub::default();
    let closes = transport.closes.clone();
    let driver = Driver::builder()
        .data_handler(handler)
        .engine(engine)
        .transport(Box::new(transport))
        .build()
        .unwrap();
    (driver, closes)
}

/// Receiver that acknowledges whatever block the sender wrote last.
fn echo_pair() -> (Arc<ConnectionStub>, Arc<ConnectionStub>) {
    let sender = ConnectionStub::new();
    let written = sender.written.clone();
    let receiver = ConnectionStub::new().on_read(move |_| {
        let last = written.lock().unwrap().last().cloned().unwrap_or_default();
        let record = codec::decode(&last).map_err(|e| {
            block_relay::net::ConnectionError::Transport(e.to_string())
        })?;
        Ok(Frame::binary(record.block.hash))
    });
    (sender.shared(), receiver.shared())
}

#[test]
fn test_builder_reports_missing_parts() {
    let (engine, _) = engine();

    let err = Driver::builder()
        .engine(engine.clone())
        .transport(Box::new(TransportStub::default()))
        .build()
        .unwrap_err();
    assert!(matches!(err, DriverError::MissingDataHandler));

    let err = Driver::builder()
        .data_handler(Arc::new(BlockProcessor::new()))
        .engine(engine.clone())
        .build()
        .unwrap_err();
    assert!(matches!(err, DriverError::MissingTransport));

    let err = Driver::builder()
        .data_handler(Arc::new(BlockProcessor::new()))
        .transport(Box::new(TransportStub::default()))
        .build()
        .unwrap_err();
    assert!(matches!(err, DriverError::MissingEngine));
}

#[tokio::test]
async fn test_save_block_delivers_encoded_record() {
    let (driver, _) = driver_with(Arc::new(BlockProcessor::new()));
    let (sender, receiver) = echo_pair();
    driver.set_sender(Some(sender.clone())).await;
    driver.set_receiver(Some(receiver.clone())).await;

    let args = block_args(7);
    let report = within(LONG, driver.save_block(&args)).await.unwrap();
    assert_eq!(report.attempts, 1);

    let written = sender.written();
    assert_eq!(written.len(), 1);
    let record = codec::decode(&written[0]).unwrap();
    assert_eq!(record.block.number, 7);
    assert_eq!(record.block.hash, args.header_hash);
    assert_eq!(record.block.tx_count, 1);
    assert_eq!(record.transactions[0].block_hash, args.header_hash);
}

#[tokio::test]
async fn test_blocks_are_delivered_in_call_order() {
    let (driver, _) = driver_with(Arc::new(BlockProcessor::new()));
    let (sender, receiver) = echo_pair();
    driver.set_sender(Some(sender.clone())).await;
    driver.set_receiver(Some(receiver)).await;

    for number in 1..=3 {
        within(LONG, driver.save_block(&block_args(number))).await.unwrap();
    }

    let numbers: Vec<u64> = sender
        .written()
        .iter()
        .map(|payload| codec::decode(payload).unwrap().block.number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_processing_error_is_fatal_and_sends_nothing() {
    let (driver, _) = driver_with(Arc::new(RejectingHandler));
    let sender = ConnectionStub::new().shared();
    driver.set_sender(Some(sender.clone())).await;
    driver
        .set_receiver(Some(ConnectionStub::new().shared()))
        .await;

    let err = within(LONG, driver.save_block(&block_args(1))).await.unwrap_err();

    assert!(matches!(err, DriverError::Process { .. }));
    assert!(err.is_fatal_for_block());
    assert_eq!(sender.writes(), 0);
}

#[tokio::test]
async fn test_malformed_hash_is_rejected() {
    let (driver, _) = driver_with(Arc::new(BlockProcessor::new()));
    let mut args = block_args(1);
    args.header_hash.truncate(20);

    let err = within(LONG, driver.save_block(&args)).await.unwrap_err();
    assert!(err.to_string().contains("header_hash"));
}

#[tokio::test]
async fn test_state_follows_installed_connections() {
    let (driver, closes) = driver_with(Arc::new(BlockProcessor::new()));
    assert_eq!(driver.state().await, DriverState::Constructed);

    driver.set_receiver(Some(ConnectionStub::new().shared())).await;
    assert_eq!(driver.state().await, DriverState::ReceiverReady);

    driver.set_sender(Some(ConnectionStub::new().shared())).await;
    assert_eq!(driver.state().await, DriverState::BothReady);

    driver.shutdown().await.unwrap();
    assert_eq!(driver.state().await, DriverState::Closed);
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    driver.shutdown().await.unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1, "transport closed once");
}

#[tokio::test]
async fn test_shutdown_closes_connections_and_fails_fast() {
    let (driver, _) = driver_with(Arc::new(BlockProcessor::new()));
    let sender = ConnectionStub::new().shared();
    let receiver = ConnectionStub::new().shared();
    driver.set_sender(Some(sender.clone())).await;
    driver.set_receiver(Some(receiver.clone())).await;

    driver.shutdown().await.unwrap();
    assert_eq!(sender.closes(), 1);
    assert_eq!(receiver.closes(), 1);

    let err = within(Duration::from_millis(100), driver.save_block(&block_args(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Closed));
}

#[tokio::test]
async fn test_shutdown_releases_blocked_save() {
    let (driver, _) = driver_with(Arc::new(BlockProcessor::new()));
    let driver = Arc::new(driver);
    let receiver = ConnectionStub::new().hang_reads().shared();
    driver.set_sender(Some(ConnectionStub::new().shared())).await;
    driver.set_receiver(Some(receiver.clone())).await;

    let task = {
        let driver = driver.clone();
        tokio::spawn(async move { driver.save_block(&block_args(1)).await })
    };
    assert!(wait_until(LONG, || receiver.reads() == 1).await);

    driver.shutdown().await.unwrap();
    let err = within(LONG, task).await.unwrap().unwrap_err();
    assert!(matches!(err, DriverError::Closed));
}

#[tokio::test]
async fn test_transport_close_error_is_returned() {
    let (engine, _) = engine();
    let transport = TransportStub {
        fail: true,
        ..Default::default()
    };
    let driver = Driver::builder()
        .data_handler(Arc::new(BlockProcessor::new()))
        .engine(engine.clone())
        .transport(Box::new(transport))
        .build()
        .unwrap();

    let err = driver.shutdown().await.unwrap_err();
    assert!(matches!(err, DriverError::Transport(_)));
    assert!(engine.is_closed());
    assert!(driver.is_closed());
}
