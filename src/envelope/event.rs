//! Domain representation of a CloudEvent.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use url::Url;

use super::CodecError;

/// The only CloudEvents spec version this crate speaks.
pub const SPEC_VERSION: &str = "1.0";

/// Attribute names that can never be used as extensions.
const RESERVED_ATTRIBUTES: &[&str] = &[
    "id",
    "source",
    "specversion",
    "type",
    "datacontenttype",
    "dataschema",
    "subject",
    "time",
    "data",
    "data_base64",
];

/// A scalar extension attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionValue {
    Boolean(bool),
    Integer(i32),
    String(String),
    Bytes(Vec<u8>),
    Uri(Url),
    UriRef(String),
    Timestamp(DateTime<Utc>),
}

impl ExtensionValue {
    /// Name of the CloudEvents type system kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtensionValue::Boolean(_) => "Boolean",
            ExtensionValue::Integer(_) => "Integer",
            ExtensionValue::String(_) => "String",
            ExtensionValue::Bytes(_) => "Binary",
            ExtensionValue::Uri(_) => "URI",
            ExtensionValue::UriRef(_) => "URI-reference",
            ExtensionValue::Timestamp(_) => "Timestamp",
        }
    }

    /// Strict string coercion: only `String` values convert.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtensionValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ExtensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionValue::Boolean(b) => write!(f, "{}", b),
            ExtensionValue::Integer(i) => write!(f, "{}", i),
            ExtensionValue::String(s) | ExtensionValue::UriRef(s) => f.write_str(s),
            ExtensionValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            ExtensionValue::Uri(u) => f.write_str(u.as_str()),
            ExtensionValue::Timestamp(t) => f.write_str(&t.to_rfc3339()),
        }
    }
}

impl From<&str> for ExtensionValue {
    fn from(value: &str) -> Self {
        ExtensionValue::String(value.to_string())
    }
}

impl From<String> for ExtensionValue {
    fn from(value: String) -> Self {
        ExtensionValue::String(value)
    }
}

impl From<i32> for ExtensionValue {
    fn from(value: i32) -> Self {
        ExtensionValue::Integer(value)
    }
}

impl From<bool> for ExtensionValue {
    fn from(value: bool) -> Self {
        ExtensionValue::Boolean(value)
    }
}

/// A CloudEvent: context attributes, extensions and an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    /// URI-reference identifying the producer.
    pub source: String,
    pub spec_version: String,
    pub event_type: String,
    pub data_content_type: Option<String>,
    pub data_schema: Option<Url>,
    pub subject: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub extensions: BTreeMap<String, ExtensionValue>,
    /// `None` means the event carries no data at all, distinct from empty data.
    pub data: Option<Vec<u8>>,
}

impl Event {
    /// Create an event with the required attributes and no payload.
    pub fn new(id: impl Into<String>, source: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            spec_version: SPEC_VERSION.to_string(),
            event_type: event_type.into(),
            data_content_type: None,
            data_schema: None,
            subject: None,
            time: None,
            extensions: BTreeMap::new(),
            data: None,
        }
    }

    /// Content type with an absent value read as the empty string.
    pub fn content_type(&self) -> &str {
        self.data_content_type.as_deref().unwrap_or("")
    }

    pub fn extension(&self, name: &str) -> Option<&ExtensionValue> {
        self.extensions.get(name)
    }

    /// Set an extension. The name is lower-cased, then validated.
    pub fn set_extension(
        &mut self,
        name: &str,
        value: impl Into<ExtensionValue>,
    ) -> Result<(), CodecError> {
        let name = name.to_ascii_lowercase();
        validate_extension_name(&name)?;
        self.extensions.insert(name, value.into());
        Ok(())
    }

    /// Builder-style variant of [`Event::set_extension`].
    pub fn with_extension(
        mut self,
        name: &str,
        value: impl Into<ExtensionValue>,
    ) -> Result<Self, CodecError> {
        self.set_extension(name, value)?;
        Ok(self)
    }

    pub fn with_data(mut self, content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.data_content_type = Some(content_type.into());
        self.data = Some(data.into());
        self
    }

    /// Check the required context attributes.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.id.is_empty() {
            return Err(CodecError::MissingAttribute("id"));
        }
        if self.source.is_empty() {
            return Err(CodecError::MissingAttribute("source"));
        }
        if self.event_type.is_empty() {
            return Err(CodecError::MissingAttribute("type"));
        }
        if self.spec_version.is_empty() {
            return Err(CodecError::MissingAttribute("specversion"));
        }
        if self.spec_version != SPEC_VERSION {
            return Err(CodecError::invalid(
                "specversion",
                format!("unsupported spec version {}", self.spec_version),
            ));
        }
        for name in self.extensions.keys() {
            validate_extension_name(name)?;
        }
        Ok(())
    }
}

/// Extension names are lower-case ASCII alphanumerics and not reserved.
pub fn validate_extension_name(name: &str) -> Result<(), CodecError> {
    if name.is_empty() {
        return Err(CodecError::invalid(name, "extension name is empty"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return Err(CodecError::invalid(
            name,
            "extension names must only contain a-z and 0-9",
        ));
    }
    if RESERVED_ATTRIBUTES.contains(&name) {
        return Err(CodecError::invalid(name, "reserved attribute name"));
    }
    Ok(())
}

/// Content types whose payload is carried as text.
pub(crate) fn is_text_content_type(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    media.starts_with("text/")
        || media == "application/json"
        || media.ends_with("+json")
        || media == "application/xml"
        || media.ends_with("+xml")
}

/// Content types whose payload is a JSON value.
pub(crate) fn is_json_content_type(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    media.is_empty() || media == "application/json" || media == "text/json" || media.ends_with("+json")
}
