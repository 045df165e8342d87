//! Single-connection holder for one direction of the consumer link.
//!
//! # Invariants
//! - At most one live connection per slot
//! - Replacing closes the previous connection before the new one is visible
//! - Every `replace` bumps a generation counter; waiters watch that counter,
//!   so a replacement never blocks on the presence (or number) of waiters
//!
//! ```text
//! replace(conn) ──▶ [write lock] close old → install new → generation += 1
//! current()     ──▶ [read lock]  clone lease (connection + generation)
//! wait_*()      ──▶ watch::Receiver::wait_for(generation > seen)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, RwLock};

use crate::delivery::types::Direction;
use crate::net::connection::DuplexConnection;
use crate::observability::observer::DeliveryObserver;

/// A borrowed view of the connection installed in a slot.
#[derive(Clone)]
pub struct SlotLease {
    pub connection: Arc<dyn DuplexConnection>,
    /// Generation at which `connection` was installed.
    pub generation: u64,
}

impl std::fmt::Debug for SlotLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotLease")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

struct SlotState {
    connection: Option<Arc<dyn DuplexConnection>>,
    generation: u64,
}

/// Holds the current connection for one direction.
pub struct ConnectionSlot {
    direction: Direction,
    state: RwLock<SlotState>,
    generation_tx: watch::Sender<u64>,
    closed: AtomicBool,
    observer: Arc<dyn DeliveryObserver>,
}

impl ConnectionSlot {
    /// Create an empty slot.
    pub fn new(direction: Direction, observer: Arc<dyn DeliveryObserver>) -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            direction,
            state: RwLock::new(SlotState {
                connection: None,
                generation: 0,
            }),
            generation_tx,
            closed: AtomicBool::new(false),
            observer,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Install `connection` (or clear the slot with `None`), closing whatever
    /// was there before. Close failures are reported, never returned.
    ///
    /// On a closed slot the incoming connection is closed immediately instead.
    pub async fn replace(&self, connection: Option<Arc<dyn DuplexConnection>>) {
        let mut state = self.state.write().await;

        if self.closed.load(Ordering::SeqCst) {
            drop(state);
            if let Some(incoming) = connection {
                tracing::debug!(direction = %self.direction, "Slot closed, rejecting new connection");
                self.close_connection(incoming.as_ref()).await;
            }
            return;
        }

        if let Some(previous) = state.connection.take() {
            self.close_connection(previous.as_ref()).await;
        }

        let populated = connection.is_some();
        state.connection = connection;
        state.generation += 1;
        let generation = state.generation;
        // Published while the write lock is held so a lease generation never
        // runs ahead of the watched one.
        self.generation_tx.send_replace(generation);
        drop(state);

        self.observer.connection_replaced(self.direction, generation, populated);
    }

    /// Snapshot of the installed connection, if any.
    pub async fn current(&self) -> Option<SlotLease> {
        let state = self.state.read().await;
        state.connection.as_ref().map(|connection| SlotLease {
            connection: Arc::clone(connection),
            generation: state.generation,
        })
    }

    /// Whether a connection is installed right now.
    pub async fn is_populated(&self) -> bool {
        self.state.read().await.connection.is_some()
    }

    /// Number of `replace` calls applied so far.
    pub fn generation(&self) -> u64 {
        *self.generation_tx.borrow()
    }

    /// Suspend until the next `replace` completes.
    pub async fn wait_for_next(&self) {
        let seen = self.generation();
        self.wait_for_replacement(seen).await;
    }

    /// Suspend until a replacement newer than generation `after` is installed.
    ///
    /// Returns immediately if that already happened.
    pub async fn wait_for_replacement(&self, after: u64) {
        let mut rx = self.generation_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail while we borrow it.
        let _ = rx.wait_for(|generation| *generation > after).await;
    }

    /// If the slot is empty, suspend until the next `replace`.
    ///
    /// This is a one-shot gate: it does not loop until populated.
    pub async fn wait_if_empty(&self) {
        let seen = {
            let state = self.state.read().await;
            if state.connection.is_some() {
                return;
            }
            state.generation
        };
        tracing::debug!(direction = %self.direction, "Waiting for first connection");
        self.wait_for_replacement(seen).await;
    }

    /// Close the held connection and refuse future ones.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        self.closed.store(true, Ordering::SeqCst);

        if let Some(previous) = state.connection.take() {
            self.close_connection(previous.as_ref()).await;
            state.generation += 1;
            self.generation_tx.send_replace(state.generation);
            let generation = state.generation;
            drop(state);
            self.observer.connection_replaced(self.direction, generation, false);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close_connection(&self, connection: &dyn DuplexConnection) {
        if let Err(e) = connection.close().await {
            self.observer.close_failed(self.direction, &e);
        }
    }
}

impl std::fmt::Debug for ConnectionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSlot")
            .field("direction", &self.direction)
            .field("generation", &self.generation())
            .field("closed", &self.is_closed())
            .finish()
    }
}
