//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::time::Duration;

use cloudevents_relay::envelope::Event;
use cloudevents_relay::pb::cloud_events_service_client::CloudEventsServiceClient;
use cloudevents_relay::work::types::{EXTENSION_CLUSTER_NAME, EXTENSION_RESOURCE_ID, EXTENSION_RESOURCE_VERSION};
use cloudevents_relay::{Application, RelayConfig, Shutdown};
use serde_json::json;
use tonic::transport::Channel;

pub const MANIFEST_CREATE: &str = "io.open-cluster-management.works.v1alpha1.manifests.spec.create_request";

/// A relay running in the background on fixed local ports.
pub struct TestRelay {
    pub grpc_url: String,
    pub gateway_url: String,
    pub shutdown: Shutdown,
}

impl TestRelay {
    pub async fn client(&self) -> CloudEventsServiceClient<Channel> {
        CloudEventsServiceClient::connect(self.grpc_url.clone()).await.unwrap()
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the relay with gRPC on `grpc_port` and the gateway on `grpc_port + 1`.
pub async fn start_relay(grpc_port: u16) -> TestRelay {
    let mut config = RelayConfig::default();
    config.grpc.bind_address = format!("127.0.0.1:{grpc_port}");
    config.gateway.bind_address = format!("127.0.0.1:{}", grpc_port + 1);

    let app = Application::new(config).unwrap();
    let shutdown = Shutdown::new();
    tokio::spawn(app.run(shutdown.clone()));

    // Wait for listeners
    tokio::time::sleep(Duration::from_millis(200)).await;

    TestRelay {
        grpc_url: format!("http://127.0.0.1:{grpc_port}"),
        gateway_url: format!("http://127.0.0.1:{}", grpc_port + 1),
        shutdown,
    }
}

/// A valid manifest create event for `resource_id` at `version`.
pub fn manifest_event(resource_id: &str, version: i64) -> Event {
    Event::new(format!("evt-{resource_id}-{version}"), "test-source", MANIFEST_CREATE)
        .with_data(
            "application/json",
            serde_json::to_vec(&json!({
                "manifest": {
                    "apiVersion": "v1",
                    "kind": "ConfigMap",
                    "metadata": {"name": resource_id, "namespace": "default"}
                }
            }))
            .unwrap(),
        )
        .with_extension(EXTENSION_RESOURCE_ID, resource_id)
        .unwrap()
        .with_extension(EXTENSION_RESOURCE_VERSION, version.to_string())
        .unwrap()
        .with_extension(EXTENSION_CLUSTER_NAME, "cluster-a")
        .unwrap()
}
