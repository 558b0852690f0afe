//! Ingestion of manifest envelopes.
//!
//! Each step is a precondition for the next: convert, parse the type, check
//! the data kind, read the extensions, parse the version, decode the payload,
//! persist, publish. Nothing survives a rejected call.

use std::sync::Arc;

use tracing::{info, warn};

use super::error::IngestError;
use crate::envelope::Event;
use crate::observability::metrics;
use crate::pb::{cloud_event_send_response, CloudEvent, CloudEventSendResponse};
use crate::propagation::PropagationHub;
use crate::store::{Resource, ResourceStore};
use crate::work::types::{EXTENSION_CLUSTER_NAME, EXTENSION_RESOURCE_ID, EXTENSION_RESOURCE_VERSION};
use crate::work::{DataType, EventType, Manifest};

pub const SEND_OK_MESSAGE: &str = "Manifest posted successfully.";

/// Validates, persists and publishes inbound manifest envelopes.
pub struct IngestionHandler {
    store: Arc<dyn ResourceStore>,
    hub: Arc<PropagationHub>,
}

impl IngestionHandler {
    pub fn new(store: Arc<dyn ResourceStore>, hub: Arc<PropagationHub>) -> Self {
        Self { store, hub }
    }

    /// Handle one `Send`.
    pub async fn handle(&self, pb: CloudEvent) -> Result<CloudEventSendResponse, IngestError> {
        let result = self.ingest(pb).await;
        match &result {
            Ok(_) => metrics::record_ingest("accepted"),
            Err(e) => {
                warn!(error = %e, "Rejected cloudevent");
                metrics::record_ingest(e.reason());
            }
        }
        result
    }

    async fn ingest(&self, pb: CloudEvent) -> Result<CloudEventSendResponse, IngestError> {
        let event = Event::from_proto(pb)?;
        let resource = parse_resource(&event)?;

        self.store.put(&resource).await?;

        info!(
            resource_id = %resource.id,
            consumer_id = %resource.consumer_id,
            generation = resource.resource_generation_id,
            "Resource stored"
        );

        self.hub.publish(resource).await?;

        Ok(CloudEventSendResponse {
            message: SEND_OK_MESSAGE.to_string(),
            status: cloud_event_send_response::Status::Ok as i32,
        })
    }
}

/// Validate a manifest event and build its resource record.
pub fn parse_resource(event: &Event) -> Result<Resource, IngestError> {
    let event_type: EventType = event
        .event_type
        .parse()
        .map_err(|source| IngestError::EventType {
            event_type: event.event_type.clone(),
            source,
        })?;

    if event_type.data_type != DataType::manifest() {
        return Err(IngestError::UnsupportedDataType(event_type.data_type.to_string()));
    }

    let resource_id = string_extension(event, EXTENSION_RESOURCE_ID)?;
    let resource_version = string_extension(event, EXTENSION_RESOURCE_VERSION)?;
    let generation: i64 = resource_version
        .parse()
        .map_err(|_| IngestError::ResourceVersion(resource_version.clone()))?;
    let cluster_name = string_extension(event, EXTENSION_CLUSTER_NAME)?;

    let object = match event.content_type() {
        "application/json" | "" => {
            let data = event.data.as_deref().unwrap_or_default();
            let manifest: Manifest = serde_json::from_slice(data)?;
            manifest.manifest
        }
        // TODO: decode protobuf manifests once the payload schema is published
        "application/protobuf" => return Err(IngestError::ProtobufNotSupported),
        other => return Err(IngestError::UnsupportedContentType(other.to_string())),
    };

    Ok(Resource::new(resource_id, cluster_name, object, generation))
}

fn string_extension(event: &Event, name: &'static str) -> Result<String, IngestError> {
    let value = event.extension(name).ok_or(IngestError::Extension {
        name,
        reason: "extension not found".to_string(),
    })?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| IngestError::Extension {
            name,
            reason: format!("cannot convert {} to String", value.kind()),
        })
}
