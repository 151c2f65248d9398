//! Relay hub composition
//!
//! Ties the registry, write-gated connections, heartbeats and session
//! handlers together behind the two connection entry points and the
//! point-in-time manifest query. The HTTP/WS surface that feeds these entry
//! points lives in [`crate::server`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::WebSocket;
use futures::StreamExt;

use crate::conn::Conn;
use crate::heartbeat::Heartbeat;
use crate::protocol::DeviceManifest;
use crate::registry::Registry;
use crate::server::HubConfig;
use crate::session::ingest::IngestSession;
use crate::session::viewer::ViewerSession;

/// The relay hub
///
/// One instance serves any number of rooms, producers and viewers. Cheap to
/// share: every accepted connection's task holds an `Arc<Hub>`.
pub struct Hub {
    config: HubConfig,
    registry: Registry<Arc<Conn>>,
    next_conn_id: AtomicU64,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &Registry<Arc<Conn>> {
        &self.registry
    }

    /// Drive one producer connection to completion.
    pub async fn on_ingest_connect(self: Arc<Self>, socket: WebSocket) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(conn_id, "Ingest connection accepted");

        let (sink, stream) = socket.split();
        let conn = Arc::new(Conn::new(conn_id, sink));
        let heartbeat = Heartbeat::start(
            Arc::clone(&conn),
            self.config.ping_interval,
            self.config.event_send_timeout,
        );

        IngestSession::new(Arc::clone(&self), conn_id, conn, heartbeat)
            .run(stream)
            .await;
    }

    /// Drive one viewer connection to completion.
    ///
    /// `room` comes from the request's query string; blank means the default
    /// room.
    pub async fn on_viewer_connect(self: Arc<Self>, socket: WebSocket, room: Option<String>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let room = self.resolve_room(room);
        tracing::debug!(conn_id, room = %room, "Viewer connection accepted");

        let (sink, stream) = socket.split();
        let conn = Arc::new(Conn::new(conn_id, sink));
        let heartbeat = Heartbeat::start(
            Arc::clone(&conn),
            self.config.ping_interval,
            self.config.event_send_timeout,
        );

        ViewerSession::new(Arc::clone(&self), conn_id, conn, room, heartbeat)
            .run(stream)
            .await;
    }

    /// Point-in-time manifest of every registered device across all rooms.
    pub async fn manifest(&self) -> DeviceManifest {
        DeviceManifest::new(self.registry.all_meta().await)
    }

    fn resolve_room(&self, room: Option<String>) -> String {
        match room {
            Some(r) if !r.trim().is_empty() => r,
            _ => self.config.default_room.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_room() {
        let hub = Hub::new(HubConfig::default());

        assert_eq!(hub.resolve_room(None), "home");
        assert_eq!(hub.resolve_room(Some("".to_string())), "home");
        assert_eq!(hub.resolve_room(Some("   ".to_string())), "home");
        assert_eq!(hub.resolve_room(Some("garage".to_string())), "garage");
    }

    #[tokio::test]
    async fn test_manifest_empty() {
        let hub = Hub::new(HubConfig::default());
        let manifest = hub.manifest().await;

        assert_eq!(manifest.kind, "manifest");
        assert!(manifest.stream.is_empty());
    }
}
