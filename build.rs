//! Generates the `v1.CloudEventsService` gRPC client and server stubs.
//!
//! Message types are declared by hand in `src/pb.rs`, so no `protoc` is
//! needed at build time.

use tonic_build::manual::{Builder, Method, Service};

fn main() {
    let send = Method::builder()
        .name("send")
        .route_name("Send")
        .input_type("crate::pb::CloudEvent")
        .output_type("crate::pb::CloudEventSendResponse")
        .codec_path("tonic::codec::ProstCodec")
        .build();

    let watch = Method::builder()
        .name("watch")
        .route_name("Watch")
        .input_type("crate::pb::ResourceWatchRequest")
        .output_type("crate::pb::CloudEvent")
        .codec_path("tonic::codec::ProstCodec")
        .server_streaming()
        .build();

    let service = Service::builder()
        .name("CloudEventsService")
        .package("v1")
        .method(send)
        .method(watch)
        .build();

    Builder::new().compile(&[service]);
}
