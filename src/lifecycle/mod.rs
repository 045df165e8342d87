//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → logging → metrics → engine → server → driver → source
//!
//! Shutdown (shutdown.rs):
//!     Signal received → trigger → driver shutdown (slots, transport) → join source
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
