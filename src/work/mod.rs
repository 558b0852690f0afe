//! Work payloads and their CloudEvents encoding.
//!
//! # Responsibilities
//! - Parse and render work event types (`types.rs`)
//! - Define the manifest and status payload documents (`payload.rs`)
//! - Encode work documents into outbound events (`codec.rs`)

pub mod codec;
pub mod payload;
pub mod types;

pub use codec::{ManifestStatusCodec, WorkCodec, WorkCodecError};
pub use payload::{Manifest, ManifestStatus, ManifestWork};
pub use types::{Action, DataType, EventType, SubResource, TypeParseError};
