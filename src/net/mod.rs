//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake)
//!     → http layer (WebSocket upgrade)
//!     → connection.rs (DuplexConnection handed to a delivery slot)
//! ```
//!
//! # Design Decisions
//! - The delivery engine only sees the `DuplexConnection` trait
//! - TLS is optional and handled transparently

pub mod connection;
pub mod tls;

pub use connection::{ConnectionError, ConnectionId, DuplexConnection, Frame, FrameKind};
