//! REST gateway in front of the ingestion handler.
//!
//! Routes:
//! - `POST /v1/cloudevents` → Send
//! - `GET /v1/resources/{id}/status` → Watch (not served in-process)
//! - `GET /healthz`

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tonic::Status;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::error::GatewayError;
use super::marshaler::{MarshalerRegistry, MessageSlot, OutboundMessage};
use super::tls::load_tls_config;
use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::pb::CloudEvent;
use crate::service::IngestionHandler;

pub const X_REQUEST_ID: &str = "x-request-id";

pub const STREAMING_UNSUPPORTED: &str = "streaming calls are not yet supported in the in-process transport";

/// Grace period for in-flight TLS connections after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// State injected into handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub ingest: Arc<IngestionHandler>,
    pub marshalers: MarshalerRegistry,
}

/// HTTP server for the REST gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, ingest: Arc<IngestionHandler>) -> Self {
        let state = GatewayState {
            ingest,
            marshalers: MarshalerRegistry::default(),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &GatewayConfig, state: GatewayState) -> Router {
        let x_request_id = header::HeaderName::from_static(X_REQUEST_ID);
        Router::new()
            .route("/v1/cloudevents", post(send_handler))
            .route("/v1/resources/{id}/status", get(watch_handler))
            .route("/healthz", get(healthz))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve until `shutdown` resolves, over TLS when configured.
    pub async fn run<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self
            .config
            .bind_address
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        match &self.config.tls {
            Some(tls) => {
                let rustls = load_tls_config(std::path::Path::new(&tls.cert_path), std::path::Path::new(&tls.key_path)).await?;
                let handle = axum_server::Handle::new();
                {
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        shutdown.await;
                        handle.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
                    });
                }
                tracing::info!(address = %addr, "REST gateway listening (TLS)");
                axum_server::bind_rustls(addr, rustls)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
            None => {
                let listener = TcpListener::bind(addr).await?;
                tracing::info!(address = %listener.local_addr()?, "REST gateway listening");
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(shutdown)
                    .await?;
            }
        }

        tracing::info!("REST gateway stopped");
        Ok(())
    }
}

fn finish(route: &'static str, response: Response) -> Response {
    metrics::record_gateway_request(route, response.status().as_u16());
    response
}

async fn send_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let response = match send(&state, &headers, &body).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(status = %e.status_code(), message = e.0.message(), "Gateway send failed");
            e.into_response()
        }
    };
    finish("send", response)
}

async fn send(state: &GatewayState, headers: &HeaderMap, body: &[u8]) -> Result<Response, GatewayError> {
    let (inbound, outbound) = state.marshalers.for_request(headers);

    let mut event = CloudEvent::default();
    inbound.unmarshal(body, MessageSlot::Event(&mut event))?;

    let reply = state.ingest.handle(event).await.map_err(Status::from)?;

    let bytes = outbound
        .marshal(OutboundMessage::SendResponse(&reply))
        .map_err(|e| Status::internal(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static(outbound.content_type()))],
        bytes,
    )
        .into_response())
}

async fn watch_handler(Path(id): Path<String>) -> Response {
    tracing::debug!(resource_id = %id, "Watch requested over REST");
    finish(
        "watch",
        GatewayError(Status::unimplemented(STREAMING_UNSUPPORTED)).into_response(),
    )
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::propagation::{DeliveryMode, PropagationHub};
    use crate::store::InMemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<PropagationHub>) {
        let hub = Arc::new(PropagationHub::new(DeliveryMode::Queue, false, 1));
        let ingest = Arc::new(IngestionHandler::new(Arc::new(InMemoryStore::new(None)), hub.clone()));
        let server = GatewayServer::new(GatewayConfig::default(), ingest);
        (server.router(), hub)
    }

    fn manifest_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "specversion": "1.0",
            "id": "e1",
            "source": "test",
            "type": "io.open-cluster-management.works.v1alpha1.manifests.spec.create_request",
            "datacontenttype": "application/json",
            "resourceid": "r1",
            "resourceversion": "3",
            "clustername": "cluster-a",
            "data": {"manifest": {"kind": "ConfigMap"}}
        }))
        .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_send_through_gateway() {
        let (router, hub) = app();
        let mut watcher = hub.subscribe("");

        let response = router
            .oneshot(
                Request::post("/v1/cloudevents")
                    .header(header::CONTENT_TYPE, "application/x-cloudevents")
                    .body(Body::from(manifest_body()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert_eq!(
            body_json(response).await,
            json!({"message": "Manifest posted successfully.", "status": "OK"})
        );
        assert_eq!(watcher.try_recv().unwrap().id, "r1");
    }

    #[tokio::test]
    async fn test_bad_body_is_invalid_argument() {
        let (router, _hub) = app();
        let response = router
            .oneshot(Request::post("/v1/cloudevents").body(Body::from("{not json")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], 3);
    }

    #[tokio::test]
    async fn test_rejected_event_maps_status() {
        let (router, _hub) = app();
        let mut event: Value = serde_json::from_slice(&manifest_body()).unwrap();
        event["datacontenttype"] = json!("application/protobuf");
        event["data"] = json!("opaque");
        let response = router
            .oneshot(
                Request::post("/v1/cloudevents")
                    .body(Body::from(serde_json::to_vec(&event).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_watch_route_is_unimplemented() {
        let (router, _hub) = app();
        let response = router
            .oneshot(Request::get("/v1/resources/r1/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        let body = body_json(response).await;
        assert_eq!(body["message"], STREAMING_UNSUPPORTED);
        assert_eq!(body["code"], 12);
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let (router, _hub) = app();
        let response = router
            .oneshot(
                Request::get("/healthz")
                    .header(X_REQUEST_ID, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "req-42");
    }
}
