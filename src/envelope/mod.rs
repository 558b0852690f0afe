//! Envelope codec subsystem.
//!
//! # Data Flow
//! ```text
//! wire bytes (protobuf)
//!     → codec.rs (prost decode, structural errors)
//!     → codec.rs (pb::CloudEvent → Event, attribute validation)
//!     → Event (typed attributes + extensions + payload)
//!
//! REST / CLI:
//!     CloudEvents JSON → json.rs → Event
//! ```
//!
//! # Design Decisions
//! - Conversion is pure; no state, no side effects
//! - Structural failures (`Malformed*`) are kept apart from semantic ones
//! - `decode(encode(e)) == e` for every well-formed event

pub mod codec;
pub mod event;
pub mod json;

pub use codec::{decode, encode};
pub use event::{Event, ExtensionValue, SPEC_VERSION};

use thiserror::Error;

/// Errors raised while converting envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Wire bytes are not a valid protobuf `CloudEvent`.
    #[error("malformed protobuf envelope: {0}")]
    Malformed(#[from] prost::DecodeError),

    /// Bytes are not a valid CloudEvents JSON document.
    #[error("malformed json envelope: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// A required context attribute is absent or empty.
    #[error("missing required attribute {0}")]
    MissingAttribute(&'static str),

    /// An attribute is present but carries an unusable value.
    #[error("invalid attribute {name}: {reason}")]
    InvalidAttribute { name: String, reason: String },
}

impl CodecError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        CodecError::InvalidAttribute {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by undecodable bytes rather than bad attributes.
    pub fn is_structural(&self) -> bool {
        matches!(self, CodecError::Malformed(_) | CodecError::MalformedJson(_))
    }
}
