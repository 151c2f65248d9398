//! Viewer session handler
//!
//! Registers a consumer connection in its room, delivers the manifest
//! snapshot, then idles. The read loop exists only to notice disconnects;
//! frames and room events reach this connection from producer sessions.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitStream;
use futures::StreamExt;

use crate::conn::{Conn, MessageSink};
use crate::heartbeat::Heartbeat;
use crate::hub::Hub;
use crate::protocol::Event;
use crate::session::state::ViewerPhase;

pub(crate) struct ViewerSession {
    conn_id: u64,
    hub: Arc<Hub>,
    conn: Arc<Conn>,
    room: String,
    phase: ViewerPhase,
    _heartbeat: Heartbeat,
}

impl ViewerSession {
    pub(crate) fn new(
        hub: Arc<Hub>,
        conn_id: u64,
        conn: Arc<Conn>,
        room: String,
        heartbeat: Heartbeat,
    ) -> Self {
        Self {
            conn_id,
            hub,
            conn,
            room,
            phase: ViewerPhase::Connected,
            _heartbeat: heartbeat,
        }
    }

    pub(crate) async fn run(mut self, mut stream: SplitStream<WebSocket>) {
        let registry = self.hub.registry();

        let streams = registry
            .register_viewer(&self.room, self.conn_id, Arc::clone(&self.conn))
            .await;
        self.phase = ViewerPhase::Registered;

        let manifest = Event::Manifest { streams };
        if let Err(e) = self
            .conn
            .send_text(manifest.to_json(), self.hub.config().event_send_timeout)
            .await
        {
            // Leave the rest to the read loop: a broken connection fails its
            // next read and takes the ordinary cleanup path.
            tracing::warn!(room = %self.room, conn_id = self.conn_id, error = %e, "Manifest delivery failed");
        }

        self.phase = ViewerPhase::Idle;

        let read_deadline = self.hub.config().read_deadline;
        loop {
            match tokio::time::timeout(read_deadline, stream.next()).await {
                Err(_) => {
                    tracing::debug!(room = %self.room, conn_id = self.conn_id, "Read deadline expired");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::debug!(room = %self.room, conn_id = self.conn_id, error = %e, "Read failed");
                    break;
                }
                Ok(Some(Ok(Message::Close(_)))) => break,
                // Anything else (pongs included) just proves liveness.
                Ok(Some(Ok(_))) => {}
            }
        }

        registry.unregister_viewer(&self.room, self.conn_id).await;
        self.phase = ViewerPhase::Closed;
        self.conn.close().await;
        tracing::info!(room = %self.room, conn_id = self.conn_id, "Viewer session closed");
        debug_assert!(self.phase.is_terminal());
    }
}
