//! Delivery subsystem.
//!
//! # Data Flow
//! ```text
//! Driver::save_block
//!     → DeliveryRequest (payload + ack token)
//!     → engine.rs (gates, fixed-interval retry loop, write/read/verify)
//!     → slot.rs (sender + receiver connections, hot-swapped by the transport)
//! ```
//!
//! # Design Decisions
//! - Deliveries never give up; only shutdown ends one early
//! - Slots wake waiters through a versioned watch channel, not a rendezvous
//! - No lock is held while a delivery is suspended

pub mod engine;
pub mod slot;
pub mod types;

pub use engine::DeliveryEngine;
pub use slot::{ConnectionSlot, SlotLease};
pub use types::{
    AttemptOutcome, DeliveryError, DeliveryReport, DeliveryRequest, DeliveryResult, Direction,
    EngineStatus,
};
