//! REST gateway.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → server.rs (routing, request id, limits)
//!     → marshaler.rs (Content-Type → CloudEvent)
//!     → service::IngestionHandler
//!     → marshaler.rs (Accept → response body)
//! errors → error.rs (gRPC code → HTTP status)
//! ```

pub mod error;
pub mod marshaler;
pub mod server;
pub mod tls;

pub use error::GatewayError;
pub use marshaler::{Marshaler, MarshalerRegistry};
pub use server::GatewayServer;
