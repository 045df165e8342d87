//! Block relay library.
//!
//! Streams finalized blocks to a single consumer over a pair of WebSocket
//! connections and waits for each block's hash to come back before moving on.

pub mod block;
pub mod blockchain;
pub mod config;
pub mod consumer;
pub mod delivery;
pub mod driver;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::schema::RelayConfig;
pub use delivery::DeliveryEngine;
pub use driver::Driver;
pub use http::RelayServer;
pub use lifecycle::Shutdown;
