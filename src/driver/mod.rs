//! Driver facade subsystem.
//!
//! # State Machine
//! ```text
//! Constructed ──▶ SenderReady ─┐
//!      │                       ├──▶ BothReady
//!      └────────▶ ReceiverReady┘
//! any state ── shutdown() ──▶ Closed (terminal, save_block fails fast)
//! ```

pub mod facade;
pub mod types;

pub use facade::{Driver, DriverBuilder};
pub use types::{DriverError, DriverResult, DriverState, Transport};
