//! Block source identifiers and errors.

use std::fmt;

use thiserror::Error;

pub use crate::config::schema::SourceConfig;

/// EIP-155 chain identifier reported by `eth_chainId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain {}", self.0)
    }
}

/// Why the follower could not read from the node.
///
/// Everything except `InvalidUrl` is transient from the follower's point of
/// view and retried with backoff.
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Invalid RPC URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Every configured provider failed or timed out for this call.
    #[error("{call}: all {providers} RPC providers failed")]
    Unavailable { call: &'static str, providers: usize },

    #[error("Node reports {actual}, configured for {expected}")]
    WrongChain { expected: ChainId, actual: ChainId },

    /// The node does not know a block that should already be final.
    #[error("Block {0} not found")]
    BlockNotFound(u64),
}

pub type BlockchainResult<T> = Result<T, BlockchainError>;
