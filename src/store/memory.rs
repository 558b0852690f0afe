//! In-memory resource store with optional JSON snapshot persistence.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Resource, ResourceStore, StoreError};

/// A thread-safe resource map keyed by resource id. Last write wins.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<DashMap<String, Resource>>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryStore {
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            snapshot_path,
        }
    }

    /// Create a store bound to `path`, loading its snapshot if one exists.
    pub fn load_from_file(path: &Path) -> Result<Self, StoreError> {
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: HashMap<String, Resource> = serde_json::from_reader(reader)?;
            for (id, resource) in map {
                store.inner.insert(id, resource);
            }
            tracing::info!(path = ?path, resources = store.inner.len(), "Loaded resource snapshot");
        }
        Ok(store)
    }

    /// Write all resources to the snapshot path, if one is configured.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        if let Some(path) = &self.snapshot_path {
            let map: HashMap<_, _> = self
                .inner
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect();
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer(writer, &map)?;
            tracing::info!(path = ?path, resources = map.len(), "Saved resource snapshot");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn put(&self, resource: &Resource) -> Result<(), StoreError> {
        self.inner.insert(resource.id.clone(), resource.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Resource>, StoreError> {
        Ok(self.inner.get(id).map(|r| r.value().clone()))
    }
}
