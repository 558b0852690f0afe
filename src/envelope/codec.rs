//! Conversion between [`Event`] and the CloudEvents protobuf format.

use chrono::{DateTime, Utc};
use prost::Message;
use url::Url;

use super::event::is_text_content_type;
use super::{CodecError, Event, ExtensionValue};
use crate::pb::cloud_event::Data;
use crate::pb::cloud_event_attribute_value::Attr;
use crate::pb::{CloudEvent, CloudEventAttributeValue};

const ATTR_DATA_CONTENT_TYPE: &str = "datacontenttype";
const ATTR_DATA_SCHEMA: &str = "dataschema";
const ATTR_SUBJECT: &str = "subject";
const ATTR_TIME: &str = "time";

const CONTENT_TYPE_PROTOBUF: &str = "application/protobuf";

/// Decode protobuf wire bytes into an event.
pub fn decode(bytes: &[u8]) -> Result<Event, CodecError> {
    let pb = CloudEvent::decode(bytes)?;
    Event::from_proto(pb)
}

/// Encode an event into protobuf wire bytes.
pub fn encode(event: &Event) -> Result<Vec<u8>, CodecError> {
    event.validate()?;
    Ok(event.to_proto().encode_to_vec())
}

impl Event {
    /// Build an event from its protobuf representation.
    pub fn from_proto(pb: CloudEvent) -> Result<Self, CodecError> {
        let mut event = Event::new(pb.id, pb.source, pb.r#type);
        event.spec_version = pb.spec_version;

        for (name, value) in pb.attributes {
            let attr = value
                .attr
                .ok_or_else(|| CodecError::invalid(&name, "attribute has no value"))?;
            match name.as_str() {
                ATTR_DATA_CONTENT_TYPE => match attr {
                    Attr::CeString(s) => event.data_content_type = Some(s),
                    _ => return Err(CodecError::invalid(name, "expected a String")),
                },
                ATTR_DATA_SCHEMA => {
                    let raw = match attr {
                        Attr::CeUri(s) | Attr::CeUriRef(s) | Attr::CeString(s) => s,
                        _ => return Err(CodecError::invalid(name, "expected a URI")),
                    };
                    let schema = Url::parse(&raw)
                        .map_err(|e| CodecError::invalid(ATTR_DATA_SCHEMA, e.to_string()))?;
                    event.data_schema = Some(schema);
                }
                ATTR_SUBJECT => match attr {
                    Attr::CeString(s) => event.subject = Some(s),
                    _ => return Err(CodecError::invalid(name, "expected a String")),
                },
                ATTR_TIME => {
                    let time = match attr {
                        Attr::CeTimestamp(ts) => timestamp_to_datetime(&ts)
                            .ok_or_else(|| CodecError::invalid(ATTR_TIME, "timestamp out of range"))?,
                        Attr::CeString(s) => DateTime::parse_from_rfc3339(&s)
                            .map_err(|e| CodecError::invalid(ATTR_TIME, e.to_string()))?
                            .with_timezone(&Utc),
                        _ => return Err(CodecError::invalid(name, "expected a Timestamp")),
                    };
                    event.time = Some(time);
                }
                _ => {
                    let value = extension_from_attr(&name, attr)?;
                    event.set_extension(&name, value)?;
                }
            }
        }

        event.data = match pb.data {
            None => None,
            Some(Data::BinaryData(bytes)) => Some(bytes),
            Some(Data::TextData(text)) => Some(text.into_bytes()),
            Some(Data::ProtoData(any)) => {
                if event.data_content_type.is_none() {
                    event.data_content_type = Some(CONTENT_TYPE_PROTOBUF.to_string());
                }
                if event.data_schema.is_none() && !any.type_url.is_empty() {
                    event.data_schema = Url::parse(&any.type_url).ok();
                }
                Some(any.value)
            }
        };

        event.validate()?;
        Ok(event)
    }

    /// Convert to the protobuf representation. Total for any event.
    pub fn to_proto(&self) -> CloudEvent {
        let mut pb = CloudEvent {
            id: self.id.clone(),
            source: self.source.clone(),
            spec_version: self.spec_version.clone(),
            r#type: self.event_type.clone(),
            ..Default::default()
        };

        if let Some(ct) = &self.data_content_type {
            pb.attributes
                .insert(ATTR_DATA_CONTENT_TYPE.into(), attr(Attr::CeString(ct.clone())));
        }
        if let Some(schema) = &self.data_schema {
            pb.attributes
                .insert(ATTR_DATA_SCHEMA.into(), attr(Attr::CeUri(schema.to_string())));
        }
        if let Some(subject) = &self.subject {
            pb.attributes
                .insert(ATTR_SUBJECT.into(), attr(Attr::CeString(subject.clone())));
        }
        if let Some(time) = &self.time {
            pb.attributes
                .insert(ATTR_TIME.into(), attr(Attr::CeTimestamp(datetime_to_timestamp(time))));
        }
        for (name, value) in &self.extensions {
            pb.attributes.insert(name.clone(), attr(extension_to_attr(value)));
        }

        pb.data = self.data.as_ref().map(|bytes| {
            let ct = self.content_type();
            if ct == CONTENT_TYPE_PROTOBUF {
                Data::ProtoData(prost_types::Any {
                    type_url: self
                        .data_schema
                        .as_ref()
                        .map(|s| s.to_string())
                        .unwrap_or_default(),
                    value: bytes.clone(),
                })
            } else if is_text_content_type(ct) {
                match String::from_utf8(bytes.clone()) {
                    Ok(text) => Data::TextData(text),
                    Err(e) => Data::BinaryData(e.into_bytes()),
                }
            } else {
                Data::BinaryData(bytes.clone())
            }
        });

        pb
    }
}

fn attr(value: Attr) -> CloudEventAttributeValue {
    CloudEventAttributeValue { attr: Some(value) }
}

fn extension_from_attr(name: &str, attr: Attr) -> Result<ExtensionValue, CodecError> {
    Ok(match attr {
        Attr::CeBoolean(b) => ExtensionValue::Boolean(b),
        Attr::CeInteger(i) => ExtensionValue::Integer(i),
        Attr::CeString(s) => ExtensionValue::String(s),
        Attr::CeBytes(b) => ExtensionValue::Bytes(b),
        Attr::CeUri(s) => {
            ExtensionValue::Uri(Url::parse(&s).map_err(|e| CodecError::invalid(name, e.to_string()))?)
        }
        Attr::CeUriRef(s) => ExtensionValue::UriRef(s),
        Attr::CeTimestamp(ts) => ExtensionValue::Timestamp(
            timestamp_to_datetime(&ts).ok_or_else(|| CodecError::invalid(name, "timestamp out of range"))?,
        ),
    })
}

fn extension_to_attr(value: &ExtensionValue) -> Attr {
    match value {
        ExtensionValue::Boolean(b) => Attr::CeBoolean(*b),
        ExtensionValue::Integer(i) => Attr::CeInteger(*i),
        ExtensionValue::String(s) => Attr::CeString(s.clone()),
        ExtensionValue::Bytes(b) => Attr::CeBytes(b.clone()),
        ExtensionValue::Uri(u) => Attr::CeUri(u.to_string()),
        ExtensionValue::UriRef(s) => Attr::CeUriRef(s.clone()),
        ExtensionValue::Timestamp(t) => Attr::CeTimestamp(datetime_to_timestamp(t)),
    }
}

fn timestamp_to_datetime(ts: &prost_types::Timestamp) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(ts.nanos).ok()?;
    DateTime::from_timestamp(ts.seconds, nanos)
}

fn datetime_to_timestamp(time: &DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    }
}
