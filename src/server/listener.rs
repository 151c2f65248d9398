//! HTTP/WebSocket surface
//!
//! Routes and the serve loop. Producers connect on `/ingest`, viewers on
//! `/view`; `/manifest` answers the point-in-time device query and
//! `/healthcheck` (also mounted at `/`) reports liveness.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::hub::Hub;
use crate::protocol::DeviceManifest;
use crate::server::config::HubConfig;

/// Query parameters accepted on the ingest endpoint
///
/// The token is opaque to the hub and never validated; the authoritative
/// room comes from the handshake message, not the URL.
#[derive(Debug, Deserialize)]
pub struct IngestParams {
    pub token: Option<String>,
    pub room: Option<String>,
}

/// Query parameters accepted on the viewer endpoint
#[derive(Debug, Deserialize)]
pub struct ViewerParams {
    pub room: Option<String>,
    pub token: Option<String>,
}

/// Build the hub's router.
///
/// Exposed so embedders and tests can serve the hub on a listener of their
/// own choosing.
pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/", get(healthcheck))
        .route("/healthcheck", get(healthcheck))
        .route("/ingest", get(ingest_ws))
        .route("/view", get(view_ws))
        .route("/manifest", get(manifest))
        .with_state(hub)
}

async fn healthcheck() -> &'static str {
    "I am alive"
}

async fn ingest_ws(
    State(hub): State<Arc<Hub>>,
    Query(params): Query<IngestParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    tracing::debug!(
        has_token = params.token.is_some(),
        room = ?params.room,
        "Ingest upgrade requested"
    );

    let max_message_size = hub.config().max_frame_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| hub.on_ingest_connect(socket))
}

async fn view_ws(
    State(hub): State<Arc<Hub>>,
    Query(params): Query<ViewerParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let max_message_size = hub.config().max_viewer_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| hub.on_viewer_connect(socket, params.room))
}

async fn manifest(State(hub): State<Arc<Hub>>) -> Json<DeviceManifest> {
    Json(hub.manifest().await)
}

/// The relay server
pub struct RelayServer {
    hub: Arc<Hub>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: HubConfig) -> Self {
        Self {
            hub: Arc::new(Hub::new(config)),
        }
    }

    /// Get a handle to the hub
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        axum::serve(listener, router(self.hub())).await?;
        Ok(())
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` resolves the listener closes; in-flight sessions drain
    /// and exit their loops on the next I/O error.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        axum::serve(listener, router(self.hub()))
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }

    async fn bind(&self) -> Result<TcpListener> {
        let addr = self.hub.config().bind_addr;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %addr, "Relay hub listening");
        Ok(listener)
    }
}
