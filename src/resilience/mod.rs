//! Resilience helpers.
//!
//! Block delivery itself retries on a fixed interval (see `delivery`); the
//! jittered exponential backoff here paces reconnects and RPC polling, where
//! a fixed cadence would hammer a peer that is down.

pub mod backoff;

pub use backoff::{calculate_backoff, Backoff};
