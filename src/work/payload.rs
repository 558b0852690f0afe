//! Payload documents carried inside work events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Condition;

/// Inbound payload of a manifest event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub manifest: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_option: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_option: Option<Value>,
}

/// Work document built by the relay for one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestWork {
    pub name: String,
    /// Addressed consumer.
    pub namespace: String,
    pub uid: String,
    /// String form of the resource generation id.
    pub resource_version: String,
    pub annotations: BTreeMap<String, String>,
    pub manifests: Vec<Value>,
    pub conditions: Vec<Condition>,
}

/// Outbound payload of a status event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}
