//! Service error types and their mapping onto RPC status codes.

use thiserror::Error;
use tonic::Status;

use crate::envelope::CodecError;
use crate::propagation::PublishError;
use crate::store::StoreError;
use crate::work::{TypeParseError, WorkCodecError};

/// Why a `Send` was rejected.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to convert protobuf to cloudevent: {0}")]
    Protocol(#[from] CodecError),

    #[error("failed to parse cloud event type {event_type}, {source}")]
    EventType {
        event_type: String,
        source: TypeParseError,
    },

    #[error("unsupported cloudevents data type {0}")]
    UnsupportedDataType(String),

    #[error("failed to get {name} extension: {reason}")]
    Extension { name: &'static str, reason: String },

    #[error("failed to convert resourceversion - {0} to int64")]
    ResourceVersion(String),

    #[error("protobuf data content type not supported")]
    ProtobufNotSupported,

    #[error("unsupported data content type {0}")]
    UnsupportedContentType(String),

    #[error("failed to unmarshal event data as resource: {0}")]
    Payload(#[from] serde_json::Error),

    /// Surfaced verbatim from the store.
    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("failed to publish resource: {0}")]
    Publish(#[from] PublishError),
}

impl IngestError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::Protocol(_) => "protocol",
            IngestError::EventType { .. } => "event_type",
            IngestError::UnsupportedDataType(_) => "data_type",
            IngestError::Extension { .. } => "extension",
            IngestError::ResourceVersion(_) => "resource_version",
            IngestError::ProtobufNotSupported => "protobuf_unsupported",
            IngestError::UnsupportedContentType(_) => "content_type",
            IngestError::Payload(_) => "payload",
            IngestError::Store(_) => "store",
            IngestError::Publish(_) => "publish",
        }
    }
}

impl From<IngestError> for Status {
    fn from(err: IngestError) -> Self {
        let message = err.to_string();
        match err {
            IngestError::ProtobufNotSupported => Status::unimplemented(message),
            IngestError::Store(_) => Status::internal(message),
            IngestError::Publish(_) => Status::unavailable(message),
            _ => Status::invalid_argument(message),
        }
    }
}

/// Why a Watch stream terminated.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to encode status event: {0}")]
    Encode(#[from] WorkCodecError),

    #[error("watch stream closed by the client")]
    StreamClosed,
}

impl From<RelayError> for Status {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Encode(_) => Status::internal(err.to_string()),
            RelayError::StreamClosed => Status::cancelled(err.to_string()),
        }
    }
}
