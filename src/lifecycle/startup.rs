//! Startup orchestration.
//!
//! Subsystems initialize in dependency order: store, propagation hub,
//! handlers, then listeners. Any startup error is fatal.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::Shutdown;
use crate::config::RelayConfig;
use crate::gateway::GatewayServer;
use crate::propagation::PropagationHub;
use crate::service::{CloudEventsGrpc, IngestionHandler, StatusRelay};
use crate::store::{InMemoryStore, StoreError};
use crate::work::ManifestStatusCodec;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid {field} {value:?}: {source}")]
    Address {
        field: &'static str,
        value: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to load store snapshot: {0}")]
    Store(#[from] StoreError),

    #[error("gRPC server failed: {0}")]
    Grpc(#[from] tonic::transport::Error),

    #[error("REST gateway failed: {0}")]
    Gateway(#[from] std::io::Error),

    #[error("server task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A fully wired relay, ready to serve.
pub struct Application {
    config: RelayConfig,
    store: Arc<InMemoryStore>,
    hub: Arc<PropagationHub>,
    ingest: Arc<IngestionHandler>,
    relay: Arc<StatusRelay>,
}

impl Application {
    pub fn new(config: RelayConfig) -> Result<Self, StartupError> {
        let store = Arc::new(match &config.store.snapshot_path {
            Some(path) => InMemoryStore::load_from_file(path)?,
            None => InMemoryStore::new(None),
        });
        info!(resources = store.len(), "Resource store ready");

        let hub = Arc::new(PropagationHub::new(
            config.relay.delivery_mode,
            config.relay.filter_by_id,
            config.relay.subscriber_capacity,
        ));
        info!(
            delivery_mode = ?hub.mode(),
            filter_by_id = config.relay.filter_by_id,
            subscriber_capacity = config.relay.subscriber_capacity,
            "Propagation hub ready"
        );
        let ingest = Arc::new(IngestionHandler::new(store.clone(), hub.clone()));
        let relay = Arc::new(StatusRelay::new(
            Arc::new(ManifestStatusCodec),
            config.relay.source.clone(),
        ));

        Ok(Self {
            config,
            store,
            hub,
            ingest,
            relay,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn hub(&self) -> &Arc<PropagationHub> {
        &self.hub
    }

    /// Serve gRPC and, when enabled, the REST gateway until `shutdown` fires.
    ///
    /// The hub is closed first so open Watch streams end and blocked Sends
    /// return; the store snapshot is written after both servers stop.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), StartupError> {
        let grpc_addr = parse_addr("grpc.bind_address", &self.config.grpc.bind_address)?;

        let hub_closer = {
            let hub = self.hub.clone();
            let signalled = shutdown.signalled();
            tokio::spawn(async move {
                signalled.await;
                info!("Shutdown signal received, closing propagation hub");
                hub.close();
            })
        };

        let grpc = CloudEventsGrpc::new(self.ingest.clone(), self.relay.clone(), self.hub.clone());
        let grpc_task = {
            let shutdown = shutdown.clone();
            let signalled = shutdown.signalled();
            tokio::spawn(async move {
                info!(address = %grpc_addr, "gRPC server listening");
                let result = tonic::transport::Server::builder()
                    .add_service(grpc.into_server())
                    .serve_with_shutdown(grpc_addr, signalled)
                    .await;
                // A failed server takes the other one down with it.
                shutdown.trigger();
                info!("gRPC server stopped");
                result
            })
        };

        let gateway_task = if self.config.gateway.enabled {
            let server = GatewayServer::new(self.config.gateway.clone(), self.ingest.clone());
            let shutdown = shutdown.clone();
            let signalled = shutdown.signalled();
            Some(tokio::spawn(async move {
                let result = server.run(signalled).await;
                shutdown.trigger();
                result
            }))
        } else {
            None
        };

        let grpc_result = grpc_task.await;
        let gateway_result = match gateway_task {
            Some(task) => Some(task.await),
            None => None,
        };
        let _ = hub_closer.await;

        if self.config.store.snapshot_path.is_some() {
            self.store.save_to_file()?;
            info!(resources = self.store.len(), "Store snapshot saved");
        }

        grpc_result??;
        if let Some(result) = gateway_result {
            result??;
        }
        info!("Shutdown complete");
        Ok(())
    }
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|source| StartupError::Address {
        field,
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Resource, ResourceStore};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_loads_snapshot_on_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = InMemoryStore::new(Some(path.clone()));
            store
                .put(&Resource::new("r1", "cluster-a", json!({"kind": "ConfigMap"}), 1))
                .await
                .unwrap();
            store.save_to_file().unwrap();
        }

        let mut config = RelayConfig::default();
        config.store.snapshot_path = Some(path);
        let app = Application::new(config).unwrap();
        assert_eq!(app.store().len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut config = RelayConfig::default();
        config.grpc.bind_address = "127.0.0.1:0".into();
        config.gateway.enabled = false;
        let app = Application::new(config).unwrap();
        let hub = app.hub().clone();

        let shutdown = Shutdown::new();
        let task = tokio::spawn(app.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(hub.is_closed());
    }

    #[test]
    fn test_bad_address() {
        let err = parse_addr("grpc.bind_address", "nowhere").unwrap_err();
        assert!(err.to_string().starts_with("invalid grpc.bind_address \"nowhere\""));
    }
}
