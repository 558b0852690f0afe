//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::observability::LogFormat;
use crate::propagation::DeliveryMode;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// gRPC listener.
    pub grpc: GrpcConfig,

    /// REST gateway listener.
    pub gateway: GatewayConfig,

    /// Propagation and status relay behaviour.
    pub relay: RelaySection,

    /// Resource store settings.
    pub store: StoreConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GrpcConfig {
    /// Bind address (e.g., "0.0.0.0:31320").
    pub bind_address: String,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:31320".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:31330").
    pub bind_address: String,

    /// Serve HTTPS when set.
    pub tls: Option<TlsConfig>,

    /// Per-request timeout.
    pub request_timeout_secs: u64,

    /// Maximum request body in bytes.
    pub max_body_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:31330".to_string(),
            tls: None,
            request_timeout_secs: 30,
            max_body_size: 4 * 1024 * 1024,
        }
    }
}

/// TLS configuration for the gateway listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySection {
    /// Originator name stamped on outbound status events.
    pub source: String,

    pub delivery_mode: DeliveryMode,

    /// Only deliver records whose id matches the Watch request id.
    pub filter_by_id: bool,

    /// Queue depth per subscriber.
    pub subscriber_capacity: usize,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            source: "maestro".to_string(),
            delivery_mode: DeliveryMode::Queue,
            filter_by_id: false,
            subscriber_capacity: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot loaded at startup and written on shutdown.
    pub snapshot_path: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.grpc.bind_address, "0.0.0.0:31320");
        assert_eq!(config.gateway.bind_address, "0.0.0.0:31330");
        assert!(config.gateway.enabled);
        assert_eq!(config.relay.source, "maestro");
        assert_eq!(config.relay.delivery_mode, DeliveryMode::Queue);
        assert!(!config.relay.filter_by_id);
        assert!(config.store.snapshot_path.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config: RelayConfig = toml::from_str(
            r#"
            [relay]
            delivery_mode = "broadcast"
            filter_by_id = true

            [gateway.tls]
            cert_path = "/etc/relay/tls.crt"
            key_path = "/etc/relay/tls.key"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.relay.delivery_mode, DeliveryMode::Broadcast);
        assert!(config.relay.filter_by_id);
        assert_eq!(config.relay.subscriber_capacity, 1);
        assert_eq!(config.gateway.tls.unwrap().key_path, "/etc/relay/tls.key");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }
}
