//! The `v1.CloudEventsService` core.
//!
//! # Data Flow
//! ```text
//! Send(CloudEvent)
//!     → ingest.rs (validate, persist, publish)
//!     → propagation hub
//!
//! Watch(ResourceWatchRequest)
//!     → hub subscription
//!     → relay.rs (encode status envelopes)
//!     → server stream
//! ```
//!
//! `grpc.rs` adapts both onto the tonic-generated service trait; the REST
//! gateway calls the ingestion handler in-process.

pub mod error;
pub mod grpc;
pub mod ingest;
pub mod relay;

pub use error::{IngestError, RelayError};
pub use grpc::CloudEventsGrpc;
pub use ingest::IngestionHandler;
pub use relay::StatusRelay;
