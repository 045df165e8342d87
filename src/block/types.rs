//! Block input arguments and the record shipped to the consumer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a block or transaction hash.
pub const HASH_LEN: usize = 32;

/// Header fields of a finalized block, as handed over by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: Vec<u8>,
    pub state_root: Vec<u8>,
    pub timestamp: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
}

/// Everything the host passes when a block is finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveBlockArgs {
    pub header_hash: Vec<u8>,
    pub header: BlockHeader,
    pub transaction_hashes: Vec<Vec<u8>>,
}

/// Block-level part of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub number: u64,
    pub hash: Vec<u8>,
    pub parent_hash: Vec<u8>,
    pub state_root_hash: Vec<u8>,
    pub timestamp: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub tx_count: u32,
}

/// Transaction entry of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: Vec<u8>,
    pub index: u32,
    pub block_hash: Vec<u8>,
}

/// The record encoded and delivered for each block.
///
/// `block.hash` doubles as the acknowledgment token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockResult {
    pub block: BlockRecord,
    pub transactions: Vec<TransactionRecord>,
}

/// Errors raised while turning `SaveBlockArgs` into a `BlockResult`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessError {
    #[error("header hash is empty")]
    EmptyHeaderHash,

    #[error("{field} has length {actual}, expected {expected}")]
    InvalidHashLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("block has {0} transactions, more than a record can hold")]
    TooManyTransactions(usize),
}
