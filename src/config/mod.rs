//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → handed to lifecycle::startup
//! ```
//!
//! Every field has a default, so an absent file or empty table is valid.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    GatewayConfig, GrpcConfig, ObservabilityConfig, RelayConfig, RelaySection, StoreConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
