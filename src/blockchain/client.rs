//! Blockchain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to JSON-RPC endpoints (primary + failovers)
//! - Query the chain head and finalized block contents
//! - Handle timeouts and network errors gracefully

use std::sync::Arc;
use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::Block;
use async_trait::async_trait;
use tokio::time::timeout;

use crate::block::{BlockHeader, SaveBlockArgs};
use crate::blockchain::follower::BlockSource;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ChainId, SourceConfig};

/// Blockchain RPC client wrapper with failover support.
#[derive(Clone)]
pub struct BlockchainClient {
    /// List of providers (primary + failovers).
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    config: SourceConfig,
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a new blockchain client.
    ///
    /// Only an invalid primary URL is an error. A chain ID mismatch or an
    /// unreachable node is logged and left for the follower's retries.
    pub async fn new(config: SourceConfig) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse::<url::Url>().map_err(|e| {
            BlockchainError::InvalidUrl {
                url: config.rpc_url.clone(),
                reason: e.to_string(),
            }
        })?;
        providers.push(
            Arc::new(ProviderBuilder::new().connect_http(primary_url))
                as Arc<dyn Provider + Send + Sync>,
        );

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(
                    Arc::new(ProviderBuilder::new().connect_http(url))
                        as Arc<dyn Provider + Send + Sync>,
                );
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let chain_id = self.get_chain_id().await?;
        let expected = ChainId(self.config.chain_id);
        if chain_id != expected {
            return Err(BlockchainError::WrongChain {
                expected,
                actual: chain_id,
            });
        }
        Ok(())
    }

    fn unavailable(&self, call: &'static str) -> BlockchainError {
        BlockchainError::Unavailable {
            call,
            providers: self.providers.len(),
        }
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_chain_id()).await {
                Ok(Ok(result)) => return Ok(ChainId(result)),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                }
            }
        }
        Err(self.unavailable("eth_chainId"))
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_block_number()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(self.unavailable("eth_blockNumber"))
    }

    /// Get a block with transaction hashes only.
    ///
    /// `Ok(None)` means every reachable provider answered but none knows the block.
    pub async fn get_block(&self, number: u64) -> BlockchainResult<Option<Block>> {
        let mut answered = false;
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.get_block_by_number(BlockNumberOrTag::Number(number));
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(Some(block))) => return Ok(Some(block)),
                Ok(Ok(None)) => {
                    answered = true;
                    tracing::debug!(provider_idx = i, number, "Block unknown to provider");
                }
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        if answered {
            return Ok(None);
        }
        Err(self.unavailable("eth_getBlockByNumber"))
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Get the number of confirmation blocks required.
    pub fn confirmation_blocks(&self) -> u32 {
        self.config.confirmation_blocks
    }
}

/// Build the driver input from an RPC block.
pub fn save_block_args(block: &Block) -> SaveBlockArgs {
    let header = &block.header;
    SaveBlockArgs {
        header_hash: header.hash.as_slice().to_vec(),
        header: BlockHeader {
            number: header.inner.number,
            parent_hash: header.inner.parent_hash.as_slice().to_vec(),
            state_root: header.inner.state_root.as_slice().to_vec(),
            timestamp: header.inner.timestamp,
            gas_used: header.inner.gas_used,
            gas_limit: header.inner.gas_limit,
        },
        transaction_hashes: block
            .transactions
            .hashes()
            .map(|hash| hash.as_slice().to_vec())
            .collect(),
    }
}

#[async_trait]
impl BlockSource for BlockchainClient {
    async fn latest_block_number(&self) -> BlockchainResult<u64> {
        self.get_block_number().await
    }

    async fn block(&self, number: u64) -> BlockchainResult<SaveBlockArgs> {
        match self.get_block(number).await? {
            Some(block) => Ok(save_block_args(&block)),
            None => Err(BlockchainError::BlockNotFound(number)),
        }
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
