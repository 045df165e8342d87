//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, route dispatch)
//!     → send route / ack route: WebSocket upgrade
//!     → websocket.rs (WsConnection)
//!     → delivery engine slot (sender or receiver)
//!
//! status route → engine snapshot as JSON
//! ```

pub mod server;
pub mod websocket;

pub use server::{RelayServer, ServerHandle};
pub use websocket::{WsConnection, CLOSE_TIMEOUT};
