//! Binary encoding of `BlockResult` records.

use thiserror::Error;

use crate::block::types::BlockResult;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("could not encode block result: {0}")]
    Encode(#[source] bincode::Error),

    #[error("could not decode block result: {0}")]
    Decode(#[source] bincode::Error),
}

pub fn encode(record: &BlockResult) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(record).map_err(CodecError::Encode)
}

pub fn decode(buffer: &[u8]) -> Result<BlockResult, CodecError> {
    bincode::deserialize(buffer).map_err(CodecError::Decode)
}
