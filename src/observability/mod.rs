//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ingest / hub / relay / gateway
//!     → logging.rs (structured events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms)
//!     → Prometheus scrape endpoint
//! ```
//!
//! Request IDs assigned by the gateway appear in the HTTP trace spans.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingError};
