//! End-to-end tests over the gRPC transport.

use std::time::Duration;

use cloudevents_relay::envelope::{Event, ExtensionValue};
use cloudevents_relay::pb::cloud_event_send_response::Status as SendStatus;
use cloudevents_relay::pb::ResourceWatchRequest;
use cloudevents_relay::work::types::{EXTENSION_CLUSTER_NAME, EXTENSION_RESOURCE_ID, EXTENSION_RESOURCE_VERSION};
use tonic::Code;

mod common;

const STATUS_UPDATE: &str = "io.open-cluster-management.works.v1alpha1.manifests.status.update_request";

#[tokio::test]
async fn test_send_is_relayed_to_watcher() {
    let relay = common::start_relay(38110).await;
    let mut watcher = relay.client().await;
    let mut stream = watcher
        .watch(ResourceWatchRequest { id: "r1".into() })
        .await
        .unwrap()
        .into_inner();

    let mut client = relay.client().await;
    let response = client
        .send(common::manifest_event("r1", 3).to_proto())
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.message, "Manifest posted successfully.");
    assert_eq!(response.status(), SendStatus::Ok);

    let pb = tokio::time::timeout(Duration::from_secs(5), stream.message())
        .await
        .expect("status event not relayed")
        .unwrap()
        .unwrap();
    let event = Event::from_proto(pb).unwrap();
    assert_eq!(event.event_type, STATUS_UPDATE);
    assert_eq!(event.source, "maestro");
    assert_eq!(event.extension(EXTENSION_RESOURCE_ID), Some(&ExtensionValue::from("r1")));
    assert_eq!(event.extension(EXTENSION_RESOURCE_VERSION), Some(&ExtensionValue::from("3")));
    assert_eq!(event.extension(EXTENSION_CLUSTER_NAME), Some(&ExtensionValue::from("cluster-a")));
}

#[tokio::test]
async fn test_watch_observes_send_order() {
    let relay = common::start_relay(38120).await;
    let mut watcher = relay.client().await;
    let mut stream = watcher
        .watch(ResourceWatchRequest { id: String::new() })
        .await
        .unwrap()
        .into_inner();

    let mut client = relay.client().await;
    let sender = tokio::spawn(async move {
        client.send(common::manifest_event("r1", 1).to_proto()).await.unwrap();
        client.send(common::manifest_event("r2", 1).to_proto()).await.unwrap();
    });

    let mut seen = Vec::new();
    for _ in 0..2 {
        let pb = tokio::time::timeout(Duration::from_secs(5), stream.message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let event = Event::from_proto(pb).unwrap();
        seen.push(event.extension(EXTENSION_RESOURCE_ID).cloned());
    }
    assert_eq!(
        seen,
        vec![Some(ExtensionValue::from("r1")), Some(ExtensionValue::from("r2"))]
    );
    sender.await.unwrap();
}

#[tokio::test]
async fn test_send_waits_without_watcher() {
    let relay = common::start_relay(38130).await;
    let mut client = relay.client().await;

    let pending = tokio::time::timeout(
        Duration::from_millis(300),
        client.send(common::manifest_event("r1", 1).to_proto()),
    )
    .await;
    assert!(pending.is_err(), "Send returned with no active Watch");
}

#[tokio::test]
async fn test_protobuf_payload_is_unimplemented() {
    let relay = common::start_relay(38140).await;
    let mut client = relay.client().await;

    let mut event = common::manifest_event("r1", 1);
    event.data_content_type = Some("application/protobuf".into());
    event.data = Some(vec![0x0a, 0x02, 0x68, 0x69]);

    let status = client.send(event.to_proto()).await.unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);
    assert_eq!(status.message(), "protobuf data content type not supported");
}

#[tokio::test]
async fn test_invalid_events_are_rejected() {
    let relay = common::start_relay(38150).await;
    let mut client = relay.client().await;

    let mut missing_cluster = common::manifest_event("r1", 1);
    missing_cluster.extensions.remove(EXTENSION_CLUSTER_NAME);
    let status = client.send(missing_cluster.to_proto()).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("clustername"));

    let mut bad_version = common::manifest_event("r1", 1);
    bad_version
        .set_extension(EXTENSION_RESOURCE_VERSION, "latest")
        .unwrap();
    let status = client.send(bad_version.to_proto()).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("resourceversion"));

    let mut old_version = common::manifest_event("r1", 1).to_proto();
    old_version.spec_version = "0.3".into();
    let status = client.send(old_version).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}
