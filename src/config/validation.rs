//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. All errors are returned,
//! not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RelayConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("grpc.bind_address and gateway.bind_address must differ ({0})")]
    AddressConflict(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

fn check_address(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse::<SocketAddr>() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let grpc = check_address("grpc.bind_address", &config.grpc.bind_address, &mut errors);

    if config.gateway.enabled {
        let gateway = check_address("gateway.bind_address", &config.gateway.bind_address, &mut errors);
        if let (Some(grpc), Some(gateway)) = (grpc, gateway) {
            if grpc == gateway {
                errors.push(ValidationError::AddressConflict(grpc.to_string()));
            }
        }
        if config.gateway.request_timeout_secs == 0 {
            errors.push(ValidationError::Zero("gateway.request_timeout_secs"));
        }
        if config.gateway.max_body_size == 0 {
            errors.push(ValidationError::Zero("gateway.max_body_size"));
        }
        if let Some(tls) = &config.gateway.tls {
            if tls.cert_path.trim().is_empty() {
                errors.push(ValidationError::Empty("gateway.tls.cert_path"));
            }
            if tls.key_path.trim().is_empty() {
                errors.push(ValidationError::Empty("gateway.tls.key_path"));
            }
        }
    }

    if config.relay.subscriber_capacity == 0 {
        errors.push(ValidationError::Zero("relay.subscriber_capacity"));
    }
    if config.relay.source.trim().is_empty() {
        errors.push(ValidationError::Empty("relay.source"));
    }

    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&RelayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = RelayConfig::default();
        config.grpc.bind_address = "not-an-address".into();
        config.relay.subscriber_capacity = 0;
        config.gateway.tls = Some(TlsConfig {
            cert_path: "".into(),
            key_path: "key.pem".into(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidAddress {
                    field: "grpc.bind_address",
                    value: "not-an-address".into()
                },
                ValidationError::Empty("gateway.tls.cert_path"),
                ValidationError::Zero("relay.subscriber_capacity"),
            ]
        );
    }

    #[test]
    fn test_address_conflict() {
        let mut config = RelayConfig::default();
        config.gateway.bind_address = config.grpc.bind_address.clone();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::AddressConflict(_)));
    }

    #[test]
    fn test_disabled_gateway_is_not_checked() {
        let mut config = RelayConfig::default();
        config.gateway.enabled = false;
        config.gateway.bind_address = "bogus".into();
        assert!(validate_config(&config).is_ok());
    }
}
