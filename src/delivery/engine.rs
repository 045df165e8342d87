//! Delivery engine: write the payload, read the acknowledgment, repeat until
//! the remote side returns the expected token.
//!
//! # Algorithm
//! ```text
//! deliver(request)
//!     → gate: wait for a sender if none was ever installed
//!     → gate: same for the receiver
//!     → every retry_interval:
//!           snapshot both slots (skip the tick if either is empty)
//!           write payload ── error → wait for a newer sender
//!           read ack      ── error → wait for a newer receiver
//!           binary frame == token ? return : next tick
//! ```
//!
//! The read is attempted even when the write failed; only the literal
//! byte comparison decides acknowledgment.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::DeliveryConfig;
use crate::delivery::slot::{ConnectionSlot, SlotLease};
use crate::delivery::types::{
    AttemptOutcome, DeliveryError, DeliveryReport, DeliveryRequest, DeliveryResult, Direction,
    EngineStatus,
};
use crate::net::connection::DuplexConnection;
use crate::observability::observer::DeliveryObserver;

/// Drives deliveries over a sender/receiver slot pair.
pub struct DeliveryEngine {
    sender: ConnectionSlot,
    receiver: ConnectionSlot,
    retry_interval: Duration,
    closed: watch::Sender<bool>,
    observer: Arc<dyn DeliveryObserver>,
    stats: DeliveryStats,
}

#[derive(Default)]
struct DeliveryStats {
    deliveries_completed: AtomicU64,
    attempts_total: AtomicU64,
    in_flight: Arc<AtomicU64>,
}

/// Decrements the in-flight counter when a delivery ends, however it ends.
struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl InFlightGuard {
    fn new(in_flight: &Arc<AtomicU64>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            in_flight: Arc::clone(in_flight),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DeliveryEngine {
    /// Create an engine with two empty slots.
    pub fn new(config: &DeliveryConfig, observer: Arc<dyn DeliveryObserver>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            sender: ConnectionSlot::new(Direction::Sender, Arc::clone(&observer)),
            receiver: ConnectionSlot::new(Direction::Receiver, Arc::clone(&observer)),
            retry_interval: Duration::from_millis(config.retry_interval_ms.max(1)),
            closed,
            observer,
            stats: DeliveryStats::default(),
        }
    }

    pub fn sender(&self) -> &ConnectionSlot {
        &self.sender
    }

    pub fn receiver(&self) -> &ConnectionSlot {
        &self.receiver
    }

    pub fn slot(&self, direction: Direction) -> &ConnectionSlot {
        match direction {
            Direction::Sender => &self.sender,
            Direction::Receiver => &self.receiver,
        }
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Install a new outbound connection, closing the previous one.
    pub async fn set_sender(&self, connection: Option<Arc<dyn DuplexConnection>>) {
        self.sender.replace(connection).await;
    }

    /// Install a new inbound connection, closing the previous one.
    pub async fn set_receiver(&self, connection: Option<Arc<dyn DuplexConnection>>) {
        self.receiver.replace(connection).await;
    }

    /// Deliver `request`, suspending until the remote side acknowledges it.
    ///
    /// Transport failures and mismatched acknowledgments are retried forever;
    /// the only error is the engine being shut down.
    pub async fn deliver(&self, request: &DeliveryRequest) -> DeliveryResult<DeliveryReport> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(DeliveryError::Closed);
        }

        let _in_flight = InFlightGuard::new(&self.stats.in_flight);

        tokio::select! {
            report = self.deliver_until_acknowledged(request) => {
                self.stats.deliveries_completed.fetch_add(1, Ordering::Relaxed);
                self.observer.delivered(&report);
                Ok(report)
            }
            _ = closed.wait_for(|closed| *closed) => {
                tracing::debug!("Delivery cancelled by shutdown");
                Err(DeliveryError::Closed)
            }
        }
    }

    async fn deliver_until_acknowledged(&self, request: &DeliveryRequest) -> DeliveryReport {
        let started = Instant::now();

        self.sender.wait_if_empty().await;
        self.receiver.wait_if_empty().await;

        let mut ticker = time::interval_at(started + self.retry_interval, self.retry_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts = 0u64;
        loop {
            ticker.tick().await;

            let (Some(sender), Some(receiver)) =
                (self.sender.current().await, self.receiver.current().await)
            else {
                continue;
            };

            attempts += 1;
            self.stats.attempts_total.fetch_add(1, Ordering::Relaxed);

            let outcome = self.attempt(attempts, request, &sender, &receiver).await;
            self.observer.attempt_finished(attempts, outcome);

            if outcome == AttemptOutcome::Acknowledged {
                return DeliveryReport {
                    attempts,
                    elapsed: started.elapsed(),
                };
            }
        }
    }

    /// One write-then-read cycle against the leased connections.
    async fn attempt(
        &self,
        attempt: u64,
        request: &DeliveryRequest,
        sender: &SlotLease,
        receiver: &SlotLease,
    ) -> AttemptOutcome {
        let written = sender.connection.write(request.payload()).await;
        if let Err(e) = &written {
            self.observer.write_failed(attempt, e);
            self.sender.wait_for_replacement(sender.generation).await;
        }

        let read = receiver.connection.read().await;
        if let Err(e) = &read {
            self.observer.read_failed(attempt, e);
            self.receiver.wait_for_replacement(receiver.generation).await;
        }

        match (written, read) {
            (Ok(()), Ok(frame)) if frame.is_binary() && frame.data == request.ack_token() => {
                AttemptOutcome::Acknowledged
            }
            (Ok(()), Ok(frame)) => {
                self.observer.ack_mismatch(attempt, &frame, request.ack_token());
                AttemptOutcome::Mismatch
            }
            _ => AttemptOutcome::Faulted,
        }
    }

    /// Close both slots and cancel pending and future deliveries.
    pub async fn shutdown(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        tracing::info!("Delivery engine shutting down");
        self.sender.close().await;
        self.receiver.close().await;
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub async fn status(&self) -> EngineStatus {
        EngineStatus {
            sender_connected: self.sender.is_populated().await,
            receiver_connected: self.receiver.is_populated().await,
            deliveries_completed: self.stats.deliveries_completed.load(Ordering::Relaxed),
            attempts_total: self.stats.attempts_total.load(Ordering::Relaxed),
            in_flight: self.stats.in_flight.load(Ordering::SeqCst),
            closed: self.is_closed(),
        }
    }
}

impl std::fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEngine")
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("retry_interval", &self.retry_interval)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
