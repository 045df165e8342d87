//! Block data production.
//!
//! # Data Flow
//! ```text
//! SaveBlockArgs (from the host)
//!     → processor.rs (DataHandler → BlockResult)
//!     → codec.rs (BlockResult → bytes)
//!     → payload + block hash handed to the delivery engine
//! ```

pub mod codec;
pub mod processor;
pub mod types;

pub use codec::CodecError;
pub use processor::{BlockProcessor, DataHandler};
pub use types::{
    BlockHeader, BlockRecord, BlockResult, ProcessError, SaveBlockArgs, TransactionRecord,
};
