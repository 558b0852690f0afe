//! Status relay: turns propagated records into outbound status envelopes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tonic::Status;
use tracing::{debug, warn};

use super::error::RelayError;
use crate::observability::metrics;
use crate::pb::CloudEvent;
use crate::propagation::Subscription;
use crate::store::Resource;
use crate::work::types::ANNOTATION_ORIGINAL_SOURCE;
use crate::work::{Action, EventType, ManifestWork, SubResource, WorkCodec};

/// Builds and streams status envelopes for one or more Watch calls.
pub struct StatusRelay {
    codec: Arc<dyn WorkCodec>,
    /// Originator name stamped on every outbound event.
    source: String,
}

impl StatusRelay {
    pub fn new(codec: Arc<dyn WorkCodec>, source: impl Into<String>) -> Self {
        Self {
            codec,
            source: source.into(),
        }
    }

    /// `<data type>.status.update_request`.
    pub fn status_event_type(&self) -> EventType {
        EventType::new(self.codec.data_type(), SubResource::Status, Action::UpdateRequest)
    }

    /// The work document for a record: one manifest, conditions copied through.
    pub fn build_work(&self, resource: &Resource) -> ManifestWork {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_ORIGINAL_SOURCE.to_string(), self.source.clone());
        ManifestWork {
            name: resource.id.clone(),
            namespace: resource.consumer_id.clone(),
            uid: resource.id.clone(),
            resource_version: resource.resource_generation_id.to_string(),
            annotations,
            manifests: vec![resource.object.clone()],
            conditions: resource.conditions().to_vec(),
        }
    }

    /// Encode a record as an outbound protobuf envelope.
    pub fn to_envelope(&self, resource: &Resource) -> Result<CloudEvent, RelayError> {
        let work = self.build_work(resource);
        let event = self
            .codec
            .encode(&self.source, &self.status_event_type(), &work)?;
        Ok(event.to_proto())
    }

    /// Forward records from `subscription` to `tx` until the stream or hub closes.
    ///
    /// An encode failure is sent to the client as the final stream item.
    pub async fn run(
        &self,
        mut subscription: Subscription,
        tx: mpsc::Sender<Result<CloudEvent, Status>>,
    ) -> Result<(), RelayError> {
        loop {
            let resource = tokio::select! {
                item = subscription.recv() => match item {
                    Some(resource) => resource,
                    None => {
                        debug!(
                            subscription_id = subscription.id(),
                            resource_id = subscription.resource_id(),
                            "Propagation hub closed, ending watch"
                        );
                        return Ok(());
                    }
                },
                _ = tx.closed() => return Err(RelayError::StreamClosed),
            };

            let envelope = match self.to_envelope(&resource) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(resource_id = %resource.id, error = %e, "Failed to encode status event");
                    let _ = tx.send(Err(Status::internal(e.to_string()))).await;
                    return Err(e);
                }
            };

            if tx.send(Ok(envelope)).await.is_err() {
                return Err(RelayError::StreamClosed);
            }

            metrics::record_relayed();
            debug!(
                subscription_id = subscription.id(),
                resource_id = %resource.id,
                consumer_id = %resource.consumer_id,
                "Status event relayed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Event, ExtensionValue};
    use crate::propagation::{DeliveryMode, PropagationHub};
    use crate::store::{Condition, ReconcileStatus, ResourceStatus};
    use crate::work::types::{EXTENSION_CLUSTER_NAME, EXTENSION_RESOURCE_ID, EXTENSION_RESOURCE_VERSION};
    use crate::work::{ManifestStatus, ManifestStatusCodec, WorkCodecError};
    use serde_json::json;

    fn relay() -> StatusRelay {
        StatusRelay::new(Arc::new(ManifestStatusCodec), "maestro")
    }

    fn status_record() -> Resource {
        let mut resource = Resource::new("r1", "cluster-a", json!({"kind": "ConfigMap"}), 3);
        resource.status = Some(ResourceStatus {
            reconcile_status: Some(ReconcileStatus {
                observed_version: 3,
                sent_timestamp: None,
                conditions: vec![Condition {
                    condition_type: "Available".into(),
                    status: "True".into(),
                    reason: Some("ResourcesAvailable".into()),
                    message: Some("All resources are available".into()),
                    ..Default::default()
                }],
            }),
        });
        resource
    }

    #[test]
    fn test_build_work() {
        let work = relay().build_work(&status_record());
        assert_eq!(work.resource_version, "3");
        assert_eq!(work.namespace, "cluster-a");
        assert_eq!(work.manifests, vec![json!({"kind": "ConfigMap"})]);
        assert_eq!(work.annotations[ANNOTATION_ORIGINAL_SOURCE], "maestro");
        assert_eq!(work.conditions, status_record().conditions());
    }

    #[test]
    fn test_envelope_addresses_consumer() {
        let pb = relay().to_envelope(&status_record()).unwrap();
        let event = Event::from_proto(pb).unwrap();
        assert_eq!(
            event.event_type,
            "io.open-cluster-management.works.v1alpha1.manifests.status.update_request"
        );
        assert_eq!(event.extension(EXTENSION_CLUSTER_NAME), Some(&ExtensionValue::from("cluster-a")));
        assert_eq!(event.extension(EXTENSION_RESOURCE_ID), Some(&ExtensionValue::from("r1")));
        assert_eq!(event.extension(EXTENSION_RESOURCE_VERSION), Some(&ExtensionValue::from("3")));

        let payload: ManifestStatus = serde_json::from_slice(event.data.as_deref().unwrap()).unwrap();
        assert_eq!(payload.conditions[0].reason.as_deref(), Some("ResourcesAvailable"));
    }

    struct FailingCodec;

    impl WorkCodec for FailingCodec {
        fn data_type(&self) -> crate::work::DataType {
            crate::work::DataType::manifest()
        }

        fn encode(&self, _: &str, _: &EventType, _: &ManifestWork) -> Result<Event, WorkCodecError> {
            Err(WorkCodecError::ManifestCount(0))
        }
    }

    #[tokio::test]
    async fn test_run_forwards_until_stream_closes() {
        let hub = Arc::new(PropagationHub::new(DeliveryMode::Queue, false, 1));
        let subscription = hub.subscribe("");
        let (tx, mut rx) = mpsc::channel(4);
        let relay = Arc::new(relay());
        let task = {
            let relay = relay.clone();
            tokio::spawn(async move { relay.run(subscription, tx).await })
        };

        hub.publish(status_record()).await.unwrap();
        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(Event::from_proto(first).unwrap().source, "maestro");

        drop(rx);
        assert!(matches!(task.await.unwrap(), Err(RelayError::StreamClosed)));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_encode_failure_terminates_stream() {
        let hub = Arc::new(PropagationHub::new(DeliveryMode::Queue, false, 1));
        let subscription = hub.subscribe("");
        let (tx, mut rx) = mpsc::channel(4);
        let relay = StatusRelay::new(Arc::new(FailingCodec), "maestro");
        let task = tokio::spawn(async move { relay.run(subscription, tx).await });

        hub.publish(status_record()).await.unwrap();
        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert!(matches!(task.await.unwrap(), Err(RelayError::Encode(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_ends_when_hub_closes() {
        let hub = Arc::new(PropagationHub::new(DeliveryMode::Queue, false, 1));
        let subscription = hub.subscribe("");
        let (tx, _rx) = mpsc::channel(4);
        let task = tokio::spawn(async move { relay().run(subscription, tx).await });
        hub.close();
        assert!(task.await.unwrap().is_ok());
    }
}
