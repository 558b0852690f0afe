//! Event type grammar and extension attribute names for work events.
//!
//! A work event type has the shape
//! `<group>.<version>.<resource>.<subresource>.<action>`, where the group may
//! itself contain dots.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const EXTENSION_RESOURCE_ID: &str = "resourceid";
pub const EXTENSION_RESOURCE_VERSION: &str = "resourceversion";
pub const EXTENSION_CLUSTER_NAME: &str = "clustername";
pub const EXTENSION_ORIGINAL_SOURCE: &str = "originalsource";

/// Annotation recording which system originated a work.
pub const ANNOTATION_ORIGINAL_SOURCE: &str = "cloudevents.open-cluster-management.io/originalsource";

const WORK_GROUP: &str = "io.open-cluster-management.works";
const WORK_VERSION: &str = "v1alpha1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("unsupported cloudevents type format")]
    Format,

    #[error("unsupported sub-resource {0}")]
    SubResource(String),

    #[error("unsupported action {0}")]
    Action(String),
}

/// The coarse payload kind: `<group>.<version>.<resource>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataType {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl DataType {
    /// Single manifest payloads, the only kind accepted on ingestion.
    pub fn manifest() -> Self {
        Self {
            group: WORK_GROUP.to_string(),
            version: WORK_VERSION.to_string(),
            resource: "manifests".to_string(),
        }
    }

    pub fn manifest_bundle() -> Self {
        Self {
            resource: "manifestbundles".to_string(),
            ..Self::manifest()
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.group, self.version, self.resource)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubResource {
    Spec,
    Status,
}

impl SubResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubResource::Spec => "spec",
            SubResource::Status => "status",
        }
    }
}

impl FromStr for SubResource {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spec" => Ok(SubResource::Spec),
            "status" => Ok(SubResource::Status),
            other => Err(TypeParseError::SubResource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateRequest,
    UpdateRequest,
    DeleteRequest,
    ResyncRequest,
    ResyncResponse,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateRequest => "create_request",
            Action::UpdateRequest => "update_request",
            Action::DeleteRequest => "delete_request",
            Action::ResyncRequest => "resync_request",
            Action::ResyncResponse => "resync_response",
        }
    }
}

impl FromStr for Action {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_request" => Ok(Action::CreateRequest),
            "update_request" => Ok(Action::UpdateRequest),
            "delete_request" => Ok(Action::DeleteRequest),
            "resync_request" => Ok(Action::ResyncRequest),
            "resync_response" => Ok(Action::ResyncResponse),
            other => Err(TypeParseError::Action(other.to_string())),
        }
    }
}

/// A parsed event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventType {
    pub data_type: DataType,
    pub sub_resource: SubResource,
    pub action: Action,
}

impl EventType {
    pub fn new(data_type: DataType, sub_resource: SubResource, action: Action) -> Self {
        Self {
            data_type,
            sub_resource,
            action,
        }
    }
}

impl FromStr for EventType {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() < 5 || parts.iter().any(|p| p.is_empty()) {
            return Err(TypeParseError::Format);
        }
        let n = parts.len();
        Ok(Self {
            data_type: DataType {
                group: parts[..n - 4].join("."),
                version: parts[n - 4].to_string(),
                resource: parts[n - 3].to_string(),
            },
            sub_resource: parts[n - 2].parse()?,
            action: parts[n - 1].parse()?,
        })
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.data_type,
            self.sub_resource.as_str(),
            self.action.as_str()
        )
    }
}
