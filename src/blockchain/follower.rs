//! Chain follower feeding finalized blocks into the driver.
//!
//! # Responsibilities
//! - Poll the chain head and derive the last final block
//! - Hand every final block to `Driver::save_block`, strictly in order
//! - Retry RPC failures with backoff; stop on fatal driver errors

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::block::SaveBlockArgs;
use crate::blockchain::types::{BlockchainResult, SourceConfig};
use crate::driver::{Driver, DriverError, DriverResult};
use crate::lifecycle::Shutdown;
use crate::resilience::Backoff;

const RPC_BACKOFF_BASE_MS: u64 = 250;
const RPC_BACKOFF_MAX_MS: u64 = 10_000;

/// Where finalized blocks come from.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn latest_block_number(&self) -> BlockchainResult<u64>;

    async fn block(&self, number: u64) -> BlockchainResult<SaveBlockArgs>;
}

/// Follows the chain and relays each final block exactly once, in order.
pub struct BlockFollower {
    source: Arc<dyn BlockSource>,
    driver: Arc<Driver>,
    confirmations: u64,
    poll_interval: Duration,
    next_block: Option<u64>,
    shutdown: Shutdown,
}

impl BlockFollower {
    pub fn new(
        source: Arc<dyn BlockSource>,
        driver: Arc<Driver>,
        config: &SourceConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            source,
            driver,
            confirmations: u64::from(config.confirmation_blocks),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            next_block: config.start_block,
            shutdown,
        }
    }

    /// Next block to relay, once known.
    pub fn next_block(&self) -> Option<u64> {
        self.next_block
    }

    /// Run until shutdown, the driver closing, or a fatal driver error.
    ///
    /// Returns the number of blocks relayed.
    pub async fn run(mut self) -> DriverResult<u64> {
        let mut relayed = 0u64;
        let mut backoff = Backoff::new(RPC_BACKOFF_BASE_MS, RPC_BACKOFF_MAX_MS);

        'outer: while !self.shutdown.is_triggered() {
            let head = match self.source.latest_block_number().await {
                Ok(head) => head,
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(error = %e, delay = ?delay, "Failed to read chain head");
                    if !self.pause(delay).await {
                        break;
                    }
                    continue;
                }
            };

            let safe = head.saturating_sub(self.confirmations);
            let mut next = *self.next_block.get_or_insert(safe);

            while next <= safe {
                let args = match self.source.block(next).await {
                    Ok(args) => {
                        backoff.reset();
                        args
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        tracing::warn!(number = next, error = %e, delay = ?delay, "Failed to fetch block");
                        if !self.pause(delay).await {
                            break 'outer;
                        }
                        continue 'outer;
                    }
                };

                let result = tokio::select! {
                    _ = self.shutdown.wait() => break 'outer,
                    result = self.driver.save_block(&args) => result,
                };

                match result {
                    Ok(report) => {
                        tracing::info!(
                            number = next,
                            attempts = report.attempts,
                            elapsed_ms = report.elapsed.as_millis() as u64,
                            "Block relayed"
                        );
                        relayed += 1;
                        next += 1;
                        self.next_block = Some(next);
                    }
                    Err(DriverError::Closed) => break 'outer,
                    Err(e) => {
                        tracing::error!(number = next, error = %e, "Stopping block follower");
                        return Err(e);
                    }
                }
            }

            if !self.pause(self.poll_interval).await {
                break;
            }
        }

        tracing::info!(relayed, "Block follower stopped");
        Ok(relayed)
    }

    /// Sleep unless shutdown comes first. Returns false on shutdown.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.wait() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

impl std::fmt::Debug for BlockFollower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFollower")
            .field("confirmations", &self.confirmations)
            .field("poll_interval", &self.poll_interval)
            .field("next_block", &self.next_block)
            .finish_non_exhaustive()
    }
}
