//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! JSON-RPC node(s)
//!     → client.rs (RPC connection with timeouts and failover)
//!     → follower.rs (head polling, confirmations, in-order hand-off)
//!     → Driver::save_block
//! ```
//!
//! # Constraints
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when blockchain unreachable
//! - A block is never skipped; the follower waits on it until it is relayed

pub mod client;
pub mod follower;
pub mod types;

pub use client::BlockchainClient;
pub use follower::{BlockFollower, BlockSource};
pub use types::{BlockchainError, BlockchainResult, ChainId};
