//! Protobuf wire messages for the `v1.CloudEventsService` RPC surface.
//!
//! `CloudEvent` and `CloudEventAttributeValue` follow the CloudEvents
//! protobuf format (`io.cloudevents.v1`). The service stubs are generated by
//! `build.rs` and included at the bottom of this module.

#![allow(clippy::derive_partial_eq_without_eq)]

use std::collections::HashMap;

/// A CloudEvent in protobuf form.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloudEvent {
    #[prost(string, tag = "1")]
    pub id: String,
    /// URI-reference.
    #[prost(string, tag = "2")]
    pub source: String,
    #[prost(string, tag = "3")]
    pub spec_version: String,
    #[prost(string, tag = "4")]
    pub r#type: String,
    /// Optional core attributes and extensions.
    #[prost(map = "string, message", tag = "5")]
    pub attributes: HashMap<String, CloudEventAttributeValue>,
    #[prost(oneof = "cloud_event::Data", tags = "6, 7, 8")]
    pub data: Option<cloud_event::Data>,
}

pub mod cloud_event {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Data {
        #[prost(bytes = "vec", tag = "6")]
        BinaryData(Vec<u8>),
        #[prost(string, tag = "7")]
        TextData(String),
        #[prost(message, tag = "8")]
        ProtoData(::prost_types::Any),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloudEventAttributeValue {
    #[prost(
        oneof = "cloud_event_attribute_value::Attr",
        tags = "1, 2, 3, 4, 5, 6, 7"
    )]
    pub attr: Option<cloud_event_attribute_value::Attr>,
}

pub mod cloud_event_attribute_value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Attr {
        #[prost(bool, tag = "1")]
        CeBoolean(bool),
        #[prost(int32, tag = "2")]
        CeInteger(i32),
        #[prost(string, tag = "3")]
        CeString(String),
        #[prost(bytes = "vec", tag = "4")]
        CeBytes(Vec<u8>),
        #[prost(string, tag = "5")]
        CeUri(String),
        #[prost(string, tag = "6")]
        CeUriRef(String),
        #[prost(message, tag = "7")]
        CeTimestamp(::prost_types::Timestamp),
    }
}

/// Result of a unary `Send`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloudEventSendResponse {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(enumeration = "cloud_event_send_response::Status", tag = "2")]
    pub status: i32,
}

pub mod cloud_event_send_response {
    /// Only `Ok` is defined; failures travel as RPC errors.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Status {
        Ok = 0,
    }

    impl Status {
        pub fn as_str_name(&self) -> &'static str {
            match self {
                Status::Ok => "OK",
            }
        }

        pub fn from_str_name(value: &str) -> Option<Self> {
            match value {
                "OK" => Some(Self::Ok),
                _ => None,
            }
        }
    }
}

/// Request for a server-streaming `Watch`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceWatchRequest {
    #[prost(string, tag = "1")]
    pub id: String,
}

include!(concat!(env!("OUT_DIR"), "/v1.CloudEventsService.rs"));
