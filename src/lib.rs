//! CloudEvents work relay library.

pub mod config;
pub mod envelope;
pub mod gateway;
pub mod lifecycle;
pub mod observability;
pub mod pb;
pub mod propagation;
pub mod service;
pub mod store;
pub mod work;

pub use config::RelayConfig;
pub use lifecycle::{Application, Shutdown};
