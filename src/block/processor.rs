//! Conversion of host block data into the delivered record.

use crate::block::types::{
    BlockRecord, BlockResult, ProcessError, SaveBlockArgs, TransactionRecord, HASH_LEN,
};

/// Turns host block arguments into a `BlockResult`.
///
/// The driver treats any error from here as fatal for the block.
pub trait DataHandler: Send + Sync {
    fn process_data(&self, args: &SaveBlockArgs) -> Result<BlockResult, ProcessError>;
}

/// Default `DataHandler`: checks hash shapes and maps fields one to one.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockProcessor;

impl BlockProcessor {
    pub fn new() -> Self {
        Self
    }
}

fn check_hash(field: &'static str, hash: &[u8]) -> Result<(), ProcessError> {
    if hash.len() != HASH_LEN {
        return Err(ProcessError::InvalidHashLength {
            field,
            expected: HASH_LEN,
            actual: hash.len(),
        });
    }
    Ok(())
}

impl DataHandler for BlockProcessor {
    fn process_data(&self, args: &SaveBlockArgs) -> Result<BlockResult, ProcessError> {
        if args.header_hash.is_empty() {
            return Err(ProcessError::EmptyHeaderHash);
        }
        check_hash("header_hash", &args.header_hash)?;

        let tx_count = u32::try_from(args.transaction_hashes.len())
            .map_err(|_| ProcessError::TooManyTransactions(args.transaction_hashes.len()))?;

        let transactions = args
            .transaction_hashes
            .iter()
            .enumerate()
            .map(|(index, hash)| {
                check_hash("transaction_hash", hash)?;
                Ok(TransactionRecord {
                    hash: hash.clone(),
                    // Bounded by tx_count above.
                    index: index as u32,
                    block_hash: args.header_hash.clone(),
                })
            })
            .collect::<Result<Vec<_>, ProcessError>>()?;

        let header = &args.header;
        Ok(BlockResult {
            block: BlockRecord {
                number: header.number,
                hash: args.header_hash.clone(),
                parent_hash: header.parent_hash.clone(),
                state_root_hash: header.state_root.clone(),
                timestamp: header.timestamp,
                gas_used: header.gas_used,
                gas_limit: header.gas_limit,
                tx_count,
            },
            transactions,
        })
    }
}
