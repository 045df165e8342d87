//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Delivery engine and slots
//!     → observer.rs (injected DeliveryObserver)
//!         → logging.rs (structured log events)
//!         → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Components receive their observer at construction, no global sink
//! - Metrics are cheap (atomic increments) and no-ops without a recorder

pub mod logging;
pub mod metrics;
pub mod observer;

pub use logging::init_logging;
pub use metrics::init_metrics;
pub use observer::{DeliveryObserver, TracingObserver};
