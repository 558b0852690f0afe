//! Encoding of work documents into CloudEvents.

use chrono::Utc;
use thiserror::Error;

use super::payload::{ManifestStatus, ManifestWork};
use super::types::{
    DataType, EventType, ANNOTATION_ORIGINAL_SOURCE, EXTENSION_CLUSTER_NAME,
    EXTENSION_ORIGINAL_SOURCE, EXTENSION_RESOURCE_ID, EXTENSION_RESOURCE_VERSION,
};
use crate::envelope::{CodecError, Event};

#[derive(Debug, Error)]
pub enum WorkCodecError {
    #[error("unsupported cloudevents data type {0}")]
    UnsupportedDataType(String),

    #[error("expected exactly one manifest in the work, found {0}")]
    ManifestCount(usize),

    #[error("failed to parse the resourceversion {0} of the work")]
    ResourceVersion(String),

    #[error("failed to encode work payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Envelope(#[from] CodecError),
}

/// Turns a work document into an event.
pub trait WorkCodec: Send + Sync {
    /// The data type this codec produces.
    fn data_type(&self) -> DataType;

    fn encode(
        &self,
        source: &str,
        event_type: &EventType,
        work: &ManifestWork,
    ) -> Result<Event, WorkCodecError>;
}

/// Encodes a single-manifest work as a status event.
#[derive(Debug, Default, Clone)]
pub struct ManifestStatusCodec;

impl WorkCodec for ManifestStatusCodec {
    fn data_type(&self) -> DataType {
        DataType::manifest()
    }

    fn encode(
        &self,
        source: &str,
        event_type: &EventType,
        work: &ManifestWork,
    ) -> Result<Event, WorkCodecError> {
        if event_type.data_type != self.data_type() {
            return Err(WorkCodecError::UnsupportedDataType(
                event_type.data_type.to_string(),
            ));
        }
        if work.manifests.len() != 1 {
            return Err(WorkCodecError::ManifestCount(work.manifests.len()));
        }
        if work.resource_version.parse::<i64>().is_err() {
            return Err(WorkCodecError::ResourceVersion(work.resource_version.clone()));
        }

        let mut event = Event::new(
            uuid::Uuid::new_v4().to_string(),
            source,
            event_type.to_string(),
        );
        event.time = Some(Utc::now());
        event.set_extension(EXTENSION_RESOURCE_ID, work.uid.as_str())?;
        event.set_extension(EXTENSION_RESOURCE_VERSION, work.resource_version.as_str())?;
        event.set_extension(EXTENSION_CLUSTER_NAME, work.namespace.as_str())?;
        if let Some(origin) = work.annotations.get(ANNOTATION_ORIGINAL_SOURCE) {
            event.set_extension(EXTENSION_ORIGINAL_SOURCE, origin.as_str())?;
        }

        let payload = ManifestStatus {
            conditions: work.conditions.clone(),
            status: None,
        };
        Ok(event.with_data("application/json", serde_json::to_vec(&payload)?))
    }
}
