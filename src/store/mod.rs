//! Resource persistence contract.
//!
//! The persistence engine is an external collaborator; this layer only needs
//! `put` and `get`. `memory.rs` provides the in-process implementation used
//! by the binary and the tests.

pub mod memory;
pub mod resource;

pub use memory::InMemoryStore;
pub use resource::{Condition, ReconcileStatus, Resource, ResourceStatus};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource store unavailable: {0}")]
    Unavailable(String),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The put/get contract of the resource store.
///
/// `put` is expected to be atomic; callers do no cleanup on failure.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn put(&self, resource: &Resource) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Resource>, StoreError>;
}
