//! Pluggable marshalers for the REST gateway.
//!
//! Requests are always CloudEvents and responses are always
//! `CloudEventSendResponse`; each format only implements those two
//! directions. Message shapes are a closed set, so a wrong target is caught
//! by a tag check instead of runtime reflection.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose, Engine as _};
use chrono::DateTime;
use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::envelope::{CodecError, Event};
use crate::pb::cloud_event::Data;
use crate::pb::cloud_event_attribute_value::Attr;
use crate::pb::{cloud_event_send_response, CloudEvent, CloudEventAttributeValue, CloudEventSendResponse};

pub const CONTENT_TYPE_CLOUDEVENTS: &str = "application/x-cloudevents";
pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// The message shapes crossing the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageShape {
    Event,
    SendResponse,
}

impl fmt::Display for MessageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageShape::Event => f.write_str("CloudEvent"),
            MessageShape::SendResponse => f.write_str("CloudEventSendResponse"),
        }
    }
}

/// A mutable destination for a decoded message.
pub enum MessageSlot<'a> {
    Event(&'a mut CloudEvent),
    SendResponse(&'a mut CloudEventSendResponse),
}

impl MessageSlot<'_> {
    pub fn shape(&self) -> MessageShape {
        match self {
            MessageSlot::Event(_) => MessageShape::Event,
            MessageSlot::SendResponse(_) => MessageShape::SendResponse,
        }
    }
}

/// A message to encode.
#[derive(Clone, Copy)]
pub enum OutboundMessage<'a> {
    Event(&'a CloudEvent),
    SendResponse(&'a CloudEventSendResponse),
}

impl OutboundMessage<'_> {
    pub fn shape(&self) -> MessageShape {
        match self {
            OutboundMessage::Event(_) => MessageShape::Event,
            OutboundMessage::SendResponse(_) => MessageShape::SendResponse,
        }
    }
}

#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("target must be a {expected} slot, got {found}")]
    WrongTarget {
        expected: MessageShape,
        found: MessageShape,
    },

    #[error("message must be a {expected}, got {found}")]
    WrongMessage {
        expected: MessageShape,
        found: MessageShape,
    },

    #[error("end of stream")]
    Eof,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Envelope(#[from] CodecError),

    #[error(transparent)]
    Proto(#[from] prost::DecodeError),

    #[error("invalid field {field}: {reason}")]
    Field { field: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Streaming decoder bound to a byte source.
pub trait Decoder {
    /// Decode the next message into `slot`; [`MarshalError::Eof`] when drained.
    fn decode(&mut self, slot: MessageSlot<'_>) -> Result<(), MarshalError>;
}

/// Streaming encoder bound to a byte sink.
pub trait Encoder {
    fn encode(&mut self, message: OutboundMessage<'_>) -> Result<(), MarshalError>;
}

/// One wire representation at the REST boundary.
pub trait Marshaler: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn marshal(&self, message: OutboundMessage<'_>) -> Result<Vec<u8>, MarshalError>;

    fn unmarshal(&self, data: &[u8], slot: MessageSlot<'_>) -> Result<(), MarshalError>;

    fn new_decoder<'r>(&self, reader: Box<dyn Read + 'r>) -> Box<dyn Decoder + 'r>;

    fn new_encoder<'w>(&self, writer: Box<dyn Write + 'w>) -> Box<dyn Encoder + 'w>;
}

fn event_slot<'s, 'a>(slot: &'s mut MessageSlot<'a>) -> Result<&'s mut CloudEvent, MarshalError> {
    match slot {
        MessageSlot::Event(event) => Ok(&mut **event),
        other => Err(MarshalError::WrongTarget {
            expected: MessageShape::Event,
            found: other.shape(),
        }),
    }
}

fn send_response<'a>(message: OutboundMessage<'a>) -> Result<&'a CloudEventSendResponse, MarshalError> {
    match message {
        OutboundMessage::SendResponse(response) => Ok(response),
        other => Err(MarshalError::WrongMessage {
            expected: MessageShape::SendResponse,
            found: other.shape(),
        }),
    }
}

/// Proto3 JSON form of a send response. Unpopulated fields are emitted.
fn send_response_json(response: &CloudEventSendResponse) -> Result<Vec<u8>, MarshalError> {
    let status = cloud_event_send_response::Status::try_from(response.status)
        .map(|s| Value::String(s.as_str_name().to_string()))
        .unwrap_or_else(|_| Value::from(response.status));
    Ok(serde_json::to_vec(&serde_json::json!({
        "message": response.message,
        "status": status,
    }))?)
}

fn encode_json_response(message: OutboundMessage<'_>) -> Result<Vec<u8>, MarshalError> {
    send_response_json(send_response(message)?)
}

fn encode_proto_response(message: OutboundMessage<'_>) -> Result<Vec<u8>, MarshalError> {
    Ok(send_response(message)?.encode_to_vec())
}

/// Encoder writing one document per message.
struct WriterEncoder<'w, F> {
    writer: Box<dyn Write + 'w>,
    encode: F,
}

impl<F> Encoder for WriterEncoder<'_, F>
where
    F: Fn(OutboundMessage<'_>) -> Result<Vec<u8>, MarshalError>,
{
    fn encode(&mut self, message: OutboundMessage<'_>) -> Result<(), MarshalError> {
        let bytes = (self.encode)(message)?;
        self.writer.write_all(&bytes)?;
        Ok(())
    }
}

/// Decoder shared by the JSON formats: a stream of concatenated documents.
struct JsonStreamDecoder<'r, F> {
    stream: serde_json::StreamDeserializer<'r, serde_json::de::IoRead<Box<dyn Read + 'r>>, Value>,
    convert: F,
}

impl<F> Decoder for JsonStreamDecoder<'_, F>
where
    F: Fn(Value) -> Result<CloudEvent, MarshalError>,
{
    fn decode(&mut self, mut slot: MessageSlot<'_>) -> Result<(), MarshalError> {
        let target = event_slot(&mut slot)?;
        match self.stream.next() {
            None => Err(MarshalError::Eof),
            Some(value) => {
                *target = (self.convert)(value?)?;
                Ok(())
            }
        }
    }
}

/// CloudEvents JSON structured format in, proto3 JSON response out.
#[derive(Debug, Default, Clone, Copy)]
pub struct CloudEventJson;

impl CloudEventJson {
    fn inbound(value: Value) -> Result<CloudEvent, MarshalError> {
        Ok(Event::from_json_value(value)?.to_proto())
    }
}

impl Marshaler for CloudEventJson {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_CLOUDEVENTS
    }

    fn marshal(&self, message: OutboundMessage<'_>) -> Result<Vec<u8>, MarshalError> {
        encode_json_response(message)
    }

    fn unmarshal(&self, data: &[u8], mut slot: MessageSlot<'_>) -> Result<(), MarshalError> {
        let target = event_slot(&mut slot)?;
        *target = Self::inbound(serde_json::from_slice(data)?)?;
        Ok(())
    }

    fn new_decoder<'r>(&self, reader: Box<dyn Read + 'r>) -> Box<dyn Decoder + 'r> {
        Box::new(JsonStreamDecoder {
            stream: serde_json::Deserializer::from_reader(reader).into_iter(),
            convert: Self::inbound,
        })
    }

    fn new_encoder<'w>(&self, writer: Box<dyn Write + 'w>) -> Box<dyn Encoder + 'w> {
        Box::new(WriterEncoder {
            writer,
            encode: encode_json_response,
        })
    }
}

/// Binary protobuf in both directions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtoMarshaler;

struct ProtoDecoder<'r> {
    reader: Box<dyn Read + 'r>,
    drained: bool,
}

impl Decoder for ProtoDecoder<'_> {
    /// The whole body is one message.
    fn decode(&mut self, mut slot: MessageSlot<'_>) -> Result<(), MarshalError> {
        let target = event_slot(&mut slot)?;
        if self.drained {
            return Err(MarshalError::Eof);
        }
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf)?;
        self.drained = true;
        if buf.is_empty() {
            return Err(MarshalError::Eof);
        }
        *target = CloudEvent::decode(buf.as_slice())?;
        Ok(())
    }
}

impl Marshaler for ProtoMarshaler {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_PROTOBUF
    }

    fn marshal(&self, message: OutboundMessage<'_>) -> Result<Vec<u8>, MarshalError> {
        encode_proto_response(message)
    }

    fn unmarshal(&self, data: &[u8], mut slot: MessageSlot<'_>) -> Result<(), MarshalError> {
        let target = event_slot(&mut slot)?;
        *target = CloudEvent::decode(data)?;
        Ok(())
    }

    fn new_decoder<'r>(&self, reader: Box<dyn Read + 'r>) -> Box<dyn Decoder + 'r> {
        Box::new(ProtoDecoder {
            reader,
            drained: false,
        })
    }

    fn new_encoder<'w>(&self, writer: Box<dyn Write + 'w>) -> Box<dyn Encoder + 'w> {
        Box::new(WriterEncoder {
            writer,
            encode: encode_proto_response,
        })
    }
}

/// Proto3 JSON mapping of `CloudEvent` in, proto3 JSON response out.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonPb;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CloudEventPbJson {
    id: String,
    source: String,
    #[serde(alias = "spec_version")]
    spec_version: String,
    #[serde(rename = "type")]
    event_type: String,
    attributes: BTreeMap<String, AttributePbJson>,
    #[serde(alias = "binary_data", skip_serializing_if = "Option::is_none")]
    binary_data: Option<String>,
    #[serde(alias = "text_data", skip_serializing_if = "Option::is_none")]
    text_data: Option<String>,
    #[serde(alias = "proto_data", skip_serializing_if = "Option::is_none")]
    proto_data: Option<AnyPbJson>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AttributePbJson {
    #[serde(alias = "ce_boolean", skip_serializing_if = "Option::is_none")]
    ce_boolean: Option<bool>,
    #[serde(alias = "ce_integer", skip_serializing_if = "Option::is_none")]
    ce_integer: Option<i32>,
    #[serde(alias = "ce_string", skip_serializing_if = "Option::is_none")]
    ce_string: Option<String>,
    #[serde(alias = "ce_bytes", skip_serializing_if = "Option::is_none")]
    ce_bytes: Option<String>,
    #[serde(alias = "ce_uri", skip_serializing_if = "Option::is_none")]
    ce_uri: Option<String>,
    #[serde(alias = "ce_uri_ref", skip_serializing_if = "Option::is_none")]
    ce_uri_ref: Option<String>,
    #[serde(alias = "ce_timestamp", skip_serializing_if = "Option::is_none")]
    ce_timestamp: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct AnyPbJson {
    #[serde(rename = "@type")]
    type_url: String,
    value: String,
}

fn decode_base64(field: &str, raw: &str) -> Result<Vec<u8>, MarshalError> {
    general_purpose::STANDARD
        .decode(raw.as_bytes())
        .map_err(|e| MarshalError::Field {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

impl AttributePbJson {
    fn into_attr(self, name: &str) -> Result<Option<Attr>, MarshalError> {
        let set = [
            self.ce_boolean.is_some(),
            self.ce_integer.is_some(),
            self.ce_string.is_some(),
            self.ce_bytes.is_some(),
            self.ce_uri.is_some(),
            self.ce_uri_ref.is_some(),
            self.ce_timestamp.is_some(),
        ]
        .iter()
        .filter(|s| **s)
        .count();
        if set > 1 {
            return Err(MarshalError::Field {
                field: name.to_string(),
                reason: "multiple values set for a oneof".to_string(),
            });
        }

        Ok(if let Some(b) = self.ce_boolean {
            Some(Attr::CeBoolean(b))
        } else if let Some(i) = self.ce_integer {
            Some(Attr::CeInteger(i))
        } else if let Some(s) = self.ce_string {
            Some(Attr::CeString(s))
        } else if let Some(b) = self.ce_bytes {
            Some(Attr::CeBytes(decode_base64(name, &b)?))
        } else if let Some(u) = self.ce_uri {
            Some(Attr::CeUri(u))
        } else if let Some(u) = self.ce_uri_ref {
            Some(Attr::CeUriRef(u))
        } else if let Some(t) = self.ce_timestamp {
            let time = DateTime::parse_from_rfc3339(&t).map_err(|e| MarshalError::Field {
                field: name.to_string(),
                reason: e.to_string(),
            })?;
            Some(Attr::CeTimestamp(prost_types::Timestamp {
                seconds: time.timestamp(),
                nanos: time.timestamp_subsec_nanos() as i32,
            }))
        } else {
            None
        })
    }
}

impl JsonPb {
    fn inbound(value: Value) -> Result<CloudEvent, MarshalError> {
        let doc: CloudEventPbJson = serde_json::from_value(value)?;

        let mut attributes = HashMap::with_capacity(doc.attributes.len());
        for (name, attr) in doc.attributes {
            let attr = attr.into_attr(&name)?;
            attributes.insert(name, CloudEventAttributeValue { attr });
        }

        let data = match (doc.binary_data, doc.text_data, doc.proto_data) {
            (None, None, None) => None,
            (Some(b), None, None) => Some(Data::BinaryData(decode_base64("binaryData", &b)?)),
            (None, Some(t), None) => Some(Data::TextData(t)),
            (None, None, Some(any)) => Some(Data::ProtoData(prost_types::Any {
                type_url: any.type_url,
                value: decode_base64("protoData", &any.value)?,
            })),
            _ => {
                return Err(MarshalError::Field {
                    field: "data".to_string(),
                    reason: "multiple values set for a oneof".to_string(),
                })
            }
        };

        Ok(CloudEvent {
            id: doc.id,
            source: doc.source,
            spec_version: doc.spec_version,
            r#type: doc.event_type,
            attributes,
            data,
        })
    }
}

impl Marshaler for JsonPb {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_JSON
    }

    fn marshal(&self, message: OutboundMessage<'_>) -> Result<Vec<u8>, MarshalError> {
        encode_json_response(message)
    }

    fn unmarshal(&self, data: &[u8], mut slot: MessageSlot<'_>) -> Result<(), MarshalError> {
        let target = event_slot(&mut slot)?;
        *target = Self::inbound(serde_json::from_slice(data)?)?;
        Ok(())
    }

    fn new_decoder<'r>(&self, reader: Box<dyn Read + 'r>) -> Box<dyn Decoder + 'r> {
        Box::new(JsonStreamDecoder {
            stream: serde_json::Deserializer::from_reader(reader).into_iter(),
            convert: Self::inbound,
        })
    }

    fn new_encoder<'w>(&self, writer: Box<dyn Write + 'w>) -> Box<dyn Encoder + 'w> {
        Box::new(WriterEncoder {
            writer,
            encode: encode_json_response,
        })
    }
}

/// Picks marshalers by `Content-Type` (inbound) and `Accept` (outbound).
#[derive(Clone)]
pub struct MarshalerRegistry {
    by_mime: HashMap<&'static str, Arc<dyn Marshaler>>,
    default: Arc<dyn Marshaler>,
}

impl Default for MarshalerRegistry {
    fn default() -> Self {
        let default: Arc<dyn Marshaler> = Arc::new(CloudEventJson);
        let mut registry = Self {
            by_mime: HashMap::new(),
            default: default.clone(),
        };
        registry.register(default);
        registry.register(Arc::new(ProtoMarshaler));
        registry.register(Arc::new(JsonPb));
        registry
    }
}

impl MarshalerRegistry {
    pub fn register(&mut self, marshaler: Arc<dyn Marshaler>) {
        self.by_mime.insert(marshaler.content_type(), marshaler);
    }

    pub fn get(&self, content_type: &str) -> Option<Arc<dyn Marshaler>> {
        self.by_mime.get(media_type(content_type).as_str()).cloned()
    }

    /// Inbound and outbound marshalers for a request.
    pub fn for_request(&self, headers: &HeaderMap) -> (Arc<dyn Marshaler>, Arc<dyn Marshaler>) {
        let header_value = |name| headers.get(name).and_then(|v| v.to_str().ok());

        let inbound = header_value(header::CONTENT_TYPE)
            .and_then(|ct| self.get(ct))
            .unwrap_or_else(|| self.default.clone());

        let outbound = header_value(header::ACCEPT)
            .and_then(|accept| accept.split(',').find_map(|ct| self.get(ct)))
            .unwrap_or_else(|| inbound.clone());

        (inbound, outbound)
    }
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
