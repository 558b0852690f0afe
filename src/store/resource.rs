//! Resource records exchanged between ingestion, the store and the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One addressed unit of declarative work plus its sender-supplied version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Unique within a consumer.
    pub id: String,
    /// Addressed destination, e.g. a cluster name.
    pub consumer_id: String,
    /// The decoded manifest.
    pub object: Value,
    /// Supplied by the sender, never generated here.
    pub resource_generation_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
}

impl Resource {
    pub fn new(
        id: impl Into<String>,
        consumer_id: impl Into<String>,
        object: Value,
        resource_generation_id: i64,
    ) -> Self {
        Self {
            id: id.into(),
            consumer_id: consumer_id.into(),
            object,
            resource_generation_id,
            status: None,
        }
    }

    /// Reconcile conditions reported for this resource, if any.
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .and_then(|s| s.reconcile_status.as_ref())
            .map(|r| r.conditions.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconcile_status: Option<ReconcileStatus>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileStatus {
    pub observed_version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// A reconcile condition. Opaque to this layer; copied through unmodified.
///
/// Absent fields stay absent and unknown keys are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conditions_default_to_empty() {
        let resource = Resource::new("r1", "cluster-a", json!({}), 1);
        assert!(resource.conditions().is_empty());
    }

    #[test]
    fn test_status_wire_names() {
        let value = json!({
            "id": "r1",
            "consumerId": "cluster-a",
            "object": {"kind": "ConfigMap"},
            "resourceGenerationId": 4,
            "status": {"reconcileStatus": {
                "observedVersion": 4,
                "conditions": [{"type": "Applied", "status": "True", "reason": "AppliedManifestComplete"}]
            }}
        });
        let resource: Resource = serde_json::from_value(value).unwrap();
        assert_eq!(resource.conditions().len(), 1);
        assert_eq!(resource.conditions()[0].condition_type, "Applied");
        assert_eq!(resource.conditions()[0].message, None);
    }

    #[test]
    fn test_condition_copied_through_unmodified() {
        let original = json!({
            "type": "Available",
            "status": "True",
            "reason": "",
            "lastTransitionTime": "2024-01-01T00:00:00Z",
            "severity": "Info",
            "details": {"check": "readiness"}
        });
        let condition: Condition = serde_json::from_value(original.clone()).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(""));
        assert_eq!(condition.message, None);
        assert_eq!(condition.extra["severity"], "Info");
        assert_eq!(serde_json::to_value(&condition).unwrap(), original);
    }
}
