//! tonic adapter for `v1.CloudEventsService`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::info;

use super::{IngestionHandler, RelayError, StatusRelay};
use crate::pb::cloud_events_service_server::{CloudEventsService, CloudEventsServiceServer};
use crate::pb::{CloudEvent, CloudEventSendResponse, ResourceWatchRequest};
use crate::propagation::PropagationHub;

/// Buffer between a relay task and its outbound stream.
const WATCH_STREAM_BUFFER: usize = 1;

#[derive(Clone)]
pub struct CloudEventsGrpc {
    ingest: Arc<IngestionHandler>,
    relay: Arc<StatusRelay>,
    hub: Arc<PropagationHub>,
}

impl CloudEventsGrpc {
    pub fn new(
        ingest: Arc<IngestionHandler>,
        relay: Arc<StatusRelay>,
        hub: Arc<PropagationHub>,
    ) -> Self {
        Self { ingest, relay, hub }
    }

    pub fn into_server(self) -> CloudEventsServiceServer<Self> {
        CloudEventsServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl CloudEventsService for CloudEventsGrpc {
    async fn send(
        &self,
        request: Request<CloudEvent>,
    ) -> Result<Response<CloudEventSendResponse>, Status> {
        let response = self.ingest.handle(request.into_inner()).await?;
        Ok(Response::new(response))
    }

    type WatchStream = ReceiverStream<Result<CloudEvent, Status>>;

    async fn watch(
        &self,
        request: Request<ResourceWatchRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        let resource_id = request.into_inner().id;
        let subscription = self.hub.subscribe(&resource_id);
        let subscription_id = subscription.id();
        info!(subscription_id, resource_id = %resource_id, "Watch started");

        let (tx, rx) = mpsc::channel(WATCH_STREAM_BUFFER);
        let relay = Arc::clone(&self.relay);
        tokio::spawn(async move {
            match relay.run(subscription, tx).await {
                Ok(()) | Err(RelayError::StreamClosed) => {
                    info!(subscription_id, "Watch ended");
                }
                Err(e) => {
                    info!(subscription_id, error = %e, "Watch terminated");
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
