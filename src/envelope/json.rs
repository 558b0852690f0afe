//! CloudEvents JSON structured format.
//!
//! Used by the REST gateway and the CLI client. JSON payloads are embedded
//! as `data`, text payloads as a string, anything else as `data_base64`.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use url::Url;

use super::event::{is_json_content_type, is_text_content_type, validate_extension_name};
use super::{CodecError, Event, ExtensionValue};

impl Event {
    /// Render the event in the CloudEvents JSON format.
    pub fn to_json_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("specversion".into(), Value::String(self.spec_version.clone()));
        obj.insert("id".into(), Value::String(self.id.clone()));
        obj.insert("source".into(), Value::String(self.source.clone()));
        obj.insert("type".into(), Value::String(self.event_type.clone()));
        if let Some(ct) = &self.data_content_type {
            obj.insert("datacontenttype".into(), Value::String(ct.clone()));
        }
        if let Some(schema) = &self.data_schema {
            obj.insert("dataschema".into(), Value::String(schema.to_string()));
        }
        if let Some(subject) = &self.subject {
            obj.insert("subject".into(), Value::String(subject.clone()));
        }
        if let Some(time) = &self.time {
            obj.insert("time".into(), Value::String(time.to_rfc3339()));
        }
        for (name, value) in &self.extensions {
            obj.insert(name.clone(), extension_to_json(value));
        }

        if let Some(data) = &self.data {
            let ct = self.content_type();
            let embedded = if is_json_content_type(ct) {
                serde_json::from_slice::<Value>(data).ok()
            } else if is_text_content_type(ct) {
                std::str::from_utf8(data).ok().map(|s| Value::String(s.to_string()))
            } else {
                None
            };
            match embedded {
                Some(value) => obj.insert("data".into(), value),
                None => obj.insert(
                    "data_base64".into(),
                    Value::String(general_purpose::STANDARD.encode(data)),
                ),
            };
        }

        Value::Object(obj)
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(&self.to_json_value())?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_json_value(value)
    }

    /// Parse a CloudEvents JSON document.
    pub fn from_json_value(value: Value) -> Result<Self, CodecError> {
        let Value::Object(obj) = value else {
            return Err(CodecError::invalid("event", "expected a JSON object"));
        };

        let mut event = Event::new(String::new(), String::new(), String::new());
        let mut data: Option<Value> = None;
        let mut data_base64: Option<String> = None;

        for (name, value) in obj {
            match name.as_str() {
                "specversion" => event.spec_version = required_string(&name, value)?,
                "id" => event.id = required_string(&name, value)?,
                "source" => event.source = required_string(&name, value)?,
                "type" => event.event_type = required_string(&name, value)?,
                "datacontenttype" => event.data_content_type = optional_string(&name, value)?,
                "dataschema" => {
                    if let Some(raw) = optional_string(&name, value)? {
                        event.data_schema = Some(
                            Url::parse(&raw).map_err(|e| CodecError::invalid(&name, e.to_string()))?,
                        );
                    }
                }
                "subject" => event.subject = optional_string(&name, value)?,
                "time" => {
                    if let Some(raw) = optional_string(&name, value)? {
                        let time = DateTime::parse_from_rfc3339(&raw)
                            .map_err(|e| CodecError::invalid(&name, e.to_string()))?;
                        event.time = Some(time.with_timezone(&Utc));
                    }
                }
                "data" => data = Some(value),
                "data_base64" => data_base64 = optional_string(&name, value)?,
                _ => {
                    let name = name.to_ascii_lowercase();
                    validate_extension_name(&name)?;
                    if let Some(ext) = extension_from_json(&name, value)? {
                        event.extensions.insert(name, ext);
                    }
                }
            }
        }

        event.data = match (data, data_base64) {
            (Some(_), Some(_)) => {
                return Err(CodecError::invalid(
                    "data",
                    "data and data_base64 are mutually exclusive",
                ))
            }
            (Some(Value::Null), None) | (None, None) => None,
            (Some(value), None) => Some(json_data_bytes(event.content_type(), value)?),
            (None, Some(encoded)) => Some(
                general_purpose::STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| CodecError::invalid("data_base64", e.to_string()))?,
            ),
        };

        event.validate()?;
        Ok(event)
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Event::from_json_value(value).map_err(D::Error::custom)
    }
}

fn json_data_bytes(content_type: &str, value: Value) -> Result<Vec<u8>, CodecError> {
    if !is_json_content_type(content_type) {
        if let Value::String(text) = value {
            return Ok(text.into_bytes());
        }
    }
    Ok(serde_json::to_vec(&value)?)
}

fn required_string(name: &str, value: Value) -> Result<String, CodecError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(CodecError::invalid(name, "expected a string")),
    }
}

fn optional_string(name: &str, value: Value) -> Result<Option<String>, CodecError> {
    match value {
        Value::Null => Ok(None),
        other => required_string(name, other).map(Some),
    }
}

fn extension_to_json(value: &ExtensionValue) -> Value {
    match value {
        ExtensionValue::Boolean(b) => Value::Bool(*b),
        ExtensionValue::Integer(i) => Value::from(*i),
        ExtensionValue::String(s) | ExtensionValue::UriRef(s) => Value::String(s.clone()),
        ExtensionValue::Bytes(b) => Value::String(general_purpose::STANDARD.encode(b)),
        ExtensionValue::Uri(u) => Value::String(u.to_string()),
        ExtensionValue::Timestamp(t) => Value::String(t.to_rfc3339()),
    }
}

fn extension_from_json(name: &str, value: Value) -> Result<Option<ExtensionValue>, CodecError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(ExtensionValue::Boolean(b))),
        Value::String(s) => Ok(Some(ExtensionValue::String(s))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(|i| Some(ExtensionValue::Integer(i)))
            .ok_or_else(|| CodecError::invalid(name, format!("{} is not a 32-bit integer", n))),
        Value::Array(_) | Value::Object(_) => {
            Err(CodecError::invalid(name, "extension values must be scalar"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest_event_json() -> Value {
        json!({
            "specversion": "1.0",
            "id": "0f6a6b4e",
            "source": "grpc-client",
            "type": "io.open-cluster-management.works.v1alpha1.manifests.spec.create_request",
            "datacontenttype": "application/json",
            "resourceid": "r1",
            "resourceversion": "3",
            "clustername": "cluster-a",
            "data": {"manifest": {"apiVersion": "v1", "kind": "ConfigMap"}}
        })
    }

    #[test]
    fn test_parse_structured_json() {
        let event = Event::from_json_value(manifest_event_json()).unwrap();
        assert_eq!(event.id, "0f6a6b4e");
        assert_eq!(event.content_type(), "application/json");
        assert_eq!(event.extension("clustername").and_then(|v| v.as_str()), Some("cluster-a"));
        let data: Value = serde_json::from_slice(event.data.as_deref().unwrap()).unwrap();
        assert_eq!(data["manifest"]["kind"], "ConfigMap");
    }

    #[test]
    fn test_json_round_trip_preserves_event() {
        let event = Event::from_json_value(manifest_event_json()).unwrap();
        let again = Event::from_json_value(event.to_json_value()).unwrap();
        assert_eq!(again, event);
    }

    #[test]
    fn test_binary_payload_uses_base64() {
        let event = Event::new("1", "s", "t").with_data("application/octet-stream", vec![1, 2, 3]);
        let value = event.to_json_value();
        assert_eq!(value["data_base64"], "AQID");
        assert_eq!(Event::from_json_value(value).unwrap(), event);
    }

    #[test]
    fn test_numeric_extension_becomes_integer() {
        let mut doc = manifest_event_json();
        doc["resourceversion"] = json!(3);
        let event = Event::from_json_value(doc).unwrap();
        assert_eq!(event.extension("resourceversion"), Some(&ExtensionValue::Integer(3)));
    }

    #[test]
    fn test_mixed_case_extension_is_lower_cased() {
        let mut doc = manifest_event_json();
        doc.as_object_mut().unwrap().remove("clustername");
        doc["ClusterName"] = json!("cluster-b");
        let event = Event::from_json_value(doc).unwrap();
        assert_eq!(event.extension("clustername").and_then(|v| v.as_str()), Some("cluster-b"));
    }

    #[test]
    fn test_rejects_both_data_forms() {
        let mut doc = manifest_event_json();
        doc["data_base64"] = json!("AQID");
        assert!(Event::from_json_value(doc).is_err());
    }

    #[test]
    fn test_rejects_non_object_and_bad_json() {
        assert!(Event::from_json_value(json!([1, 2])).is_err());
        let err = Event::from_json_slice(b"{not json").unwrap_err();
        assert!(err.is_structural());
    }
}
