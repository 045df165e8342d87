//! Reference consumer for the relay.
//!
//! # Responsibilities
//! - Open the block stream (send route) and the ack stream (ack route)
//! - Decode each block, hand it to a callback, acknowledge its hash
//! - Reconnect with backoff when either stream drops
//!
//! # Design Decisions
//! - Delivery is at-least-once; a block re-sent after a reconnect is acked
//!   again but handed to the callback only once
//! - Text frames are ignored; the relay only sends binary records

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::block::{codec, BlockResult, CodecError};
use crate::config::ListenerConfig;
use crate::resilience::Backoff;

/// Errors surfaced by the consumer.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("connection lost: {0}")]
    Disconnected(String),

    #[error(transparent)]
    Decode(#[from] CodecError),
}

impl ConsumerError {
    /// Whether reconnecting cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsumerError::Decode(_))
    }
}

/// Consumer settings.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Base WebSocket URL of the relay, e.g. `ws://127.0.0.1:21111`.
    pub relay_url: String,
    pub send_route: String,
    pub ack_route: String,
    /// Stop after this many distinct blocks.
    pub max_blocks: Option<u64>,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
}

impl ConsumerConfig {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self::from_listener(relay_url, &ListenerConfig::default())
    }

    /// Use the routes a relay with this listener config serves.
    pub fn from_listener(relay_url: impl Into<String>, listener: &ListenerConfig) -> Self {
        Self {
            relay_url: relay_url.into(),
            send_route: listener.send_route.clone(),
            ack_route: listener.ack_route.clone(),
            max_blocks: None,
            reconnect_base_ms: 100,
            reconnect_max_ms: 5_000,
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.relay_url.trim_end_matches('/'), route)
    }
}

pub struct BlockConsumer {
    config: ConsumerConfig,
}

impl BlockConsumer {
    pub fn new(config: ConsumerConfig) -> Self {
        Self { config }
    }

    /// Receive blocks until `max_blocks` is reached or a fatal error occurs.
    ///
    /// Without `max_blocks` this only returns on a fatal error; callers
    /// cancel it by dropping the future. Returns the number of blocks handed
    /// to `on_block`.
    pub async fn run<F>(&self, mut on_block: F) -> Result<u64, ConsumerError>
    where
        F: FnMut(&BlockResult) + Send,
    {
        let mut progress = Progress::default();
        let mut backoff = Backoff::new(self.config.reconnect_base_ms, self.config.reconnect_max_ms);

        loop {
            match self.session(&mut on_block, &mut progress, &mut backoff).await {
                Ok(()) => return Ok(progress.delivered),
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "Consumer stopped");
                    return Err(e);
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(error = %e, delay = ?delay, "Reconnecting to relay");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn reached_limit(&self, delivered: u64) -> bool {
        self.config.max_blocks.is_some_and(|max| delivered >= max)
    }

    async fn session<F>(
        &self,
        on_block: &mut F,
        progress: &mut Progress,
        backoff: &mut Backoff,
    ) -> Result<(), ConsumerError>
    where
        F: FnMut(&BlockResult) + Send,
    {
        if self.reached_limit(progress.delivered) {
            return Ok(());
        }

        let send_url = self.config.url(&self.config.send_route);
        let ack_url = self.config.url(&self.config.ack_route);

        let (mut blocks, _) = connect_async(send_url.as_str())
            .await
            .map_err(|e| ConsumerError::Connect {
                url: send_url.clone(),
                reason: e.to_string(),
            })?;
        let (mut acks, _) = connect_async(ack_url.as_str())
            .await
            .map_err(|e| ConsumerError::Connect {
                url: ack_url.clone(),
                reason: e.to_string(),
            })?;

        backoff.reset();
        tracing::info!(send_url = %send_url, ack_url = %ack_url, "Connected to relay");

        while !self.reached_limit(progress.delivered) {
            let payload = match blocks.next().await {
                Some(Ok(Message::Binary(data))) => data,
                Some(Ok(Message::Close(_))) | None => {
                    return Err(ConsumerError::Disconnected("closed by relay".into()))
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ConsumerError::Disconnected(e.to_string())),
            };

            let record = codec::decode(&payload)?;
            let hash = record.block.hash.clone();

            if progress.last_hash.as_deref() == Some(hash.as_slice()) {
                tracing::debug!(number = record.block.number, "Duplicate block, acknowledging again");
            } else {
                on_block(&record);
                progress.delivered += 1;
                progress.last_hash = Some(hash.clone());
            }

            acks.send(Message::Binary(hash.into()))
                .await
                .map_err(|e| ConsumerError::Disconnected(e.to_string()))?;
        }

        let _ = blocks.close(None).await;
        let _ = acks.close(None).await;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Progress {
    delivered: u64,
    last_hash: Option<Vec<u8>>,
}
