//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;

use block_relay::block::{BlockHeader, SaveBlockArgs};
use block_relay::config::DeliveryConfig;
use block_relay::delivery::{AttemptOutcome, DeliveryEngine, DeliveryReport, Direction};
use block_relay::driver::{DriverError, Transport};
use block_relay::net::{ConnectionError, DuplexConnection, Frame};
use block_relay::observability::DeliveryObserver;

type WriteFn = Box<dyn Fn(u64, &[u8]) -> Result<(), ConnectionError> + Send + Sync>;
type ReadFn = Box<dyn Fn(u64) -> Result<Frame, ConnectionError> + Send + Sync>;

/// Scriptable connection. Callbacks receive the 1-based call number.
pub struct ConnectionStub {
    write_fn: WriteFn,
    read_fn: ReadFn,
    hang_reads: bool,
    fail_close: bool,
    pub writes: AtomicU64,
    pub reads: AtomicU64,
    pub closes: AtomicU64,
    pub written: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ConnectionStub {
    pub fn new() -> Self {
        Self {
            write_fn: Box::new(|_, _| Ok(())),
            read_fn: Box::new(|_| Err(ConnectionError::Closed)),
            hang_reads: false,
            fail_close: false,
            writes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            closes: AtomicU64::new(0),
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn on_write<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, &[u8]) -> Result<(), ConnectionError> + Send + Sync + 'static,
    {
        self.write_fn = Box::new(f);
        self
    }

    pub fn on_read<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) -> Result<Frame, ConnectionError> + Send + Sync + 'static,
    {
        self.read_fn = Box::new(f);
        self
    }

    /// Always answer reads with `token` as a binary frame.
    pub fn acking(token: Vec<u8>) -> Self {
        Self::new().on_read(move |_| Ok(Frame::binary(token.clone())))
    }

    /// Reads never complete.
    pub fn hang_reads(mut self) -> Self {
        self.hang_reads = true;
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl DuplexConnection for ConnectionStub {
    async fn write(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        let call = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.written.lock().unwrap().push(payload.to_vec());
        (self.write_fn)(call, payload)
    }

    async fn read(&self) -> Result<Frame, ConnectionError> {
        let call = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang_reads {
            std::future::pending::<()>().await;
        }
        (self.read_fn)(call)
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(ConnectionError::Transport("close failed".into()));
        }
        Ok(())
    }
}

/// Observer that counts every event.
#[derive(Default)]
pub struct RecordingObserver {
    pub replaced: AtomicU64,
    pub close_failures: AtomicU64,
    pub write_failures: AtomicU64,
    pub read_failures: AtomicU64,
    pub mismatches: AtomicU64,
    pub delivered: AtomicU64,
    pub outcomes: Mutex<Vec<AttemptOutcome>>,
}

impl RecordingObserver {
    pub fn count(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }

    pub fn outcomes(&self) -> Vec<AttemptOutcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

impl DeliveryObserver for RecordingObserver {
    fn connection_replaced(&self, _direction: Direction, _generation: u64, _populated: bool) {
        self.replaced.fetch_add(1, Ordering::SeqCst);
    }

    fn close_failed(&self, _direction: Direction, _error: &ConnectionError) {
        self.close_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn write_failed(&self, _attempt: u64, _error: &ConnectionError) {
        self.write_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn read_failed(&self, _attempt: u64, _error: &ConnectionError) {
        self.read_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn ack_mismatch(&self, _attempt: u64, _received: &Frame, _expected: &[u8]) {
        self.mismatches.fetch_add(1, Ordering::SeqCst);
    }

    fn attempt_finished(&self, _attempt: u64, outcome: AttemptOutcome) {
        self.outcomes.lock().unwrap().push(outcome);
    }

    fn delivered(&self, _report: &DeliveryReport) {
        self.delivered.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport that only counts closes.
#[derive(Default)]
pub struct TransportStub {
    pub closes: Arc<AtomicU64>,
    pub fail: bool,
}

#[async_trait]
impl Transport for TransportStub {
    async fn close(&self) -> Result<(), DriverError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DriverError::Transport("listener stuck".into()));
        }
        Ok(())
    }
}

/// Engine with the default 50 ms retry interval and a recording observer.
pub fn engine() -> (Arc<DeliveryEngine>, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let engine = DeliveryEngine::new(&DeliveryConfig::default(), observer.clone());
    (Arc::new(engine), observer)
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Valid block arguments whose hash is derived from `number`.
pub fn block_args(number: u64) -> SaveBlockArgs {
    let mut header_hash = vec![0u8; 32];
    header_hash[..8].copy_from_slice(&number.to_be_bytes());
    header_hash[31] = 0xbb;

    SaveBlockArgs {
        header_hash,
        header: BlockHeader {
            number,
            parent_hash: vec![0xaa; 32],
            state_root: vec![0xcc; 32],
            timestamp: 1_700_000_000 + number,
            gas_used: 21_000,
            gas_limit: 30_000_000,
        },
        transaction_hashes: vec![vec![number as u8; 32]],
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Await `fut`, failing the test if it takes longer than `timeout`.
pub async fn within<T>(timeout: Duration, fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(timeout, fut)
        .await
        .expect("operation timed out")
}

/// Flag for stubs that should flip behavior mid-test.
pub fn flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}
