//! Producer session handler
//!
//! Drives one ingest connection: handshake, registration (displacing any
//! previous connection for the same device), the frame relay loop, and
//! cleanup with a `leave` broadcast.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::SplitStream;
use futures::StreamExt;

use crate::conn::{Conn, MessageSink};
use crate::error::{Error, HandshakeError, Result};
use crate::heartbeat::Heartbeat;
use crate::hub::Hub;
use crate::mux::FrameEncoder;
use crate::protocol::{Event, StreamMeta};
use crate::session::state::IngestPhase;
use crate::session::{broadcast_event, broadcast_frame};

pub(crate) struct IngestSession {
    conn_id: u64,
    hub: Arc<Hub>,
    conn: Arc<Conn>,
    phase: IngestPhase,
    // Held for the session's lifetime; dropping it stops the ping ticker.
    _heartbeat: Heartbeat,
}

impl IngestSession {
    pub(crate) fn new(hub: Arc<Hub>, conn_id: u64, conn: Arc<Conn>, heartbeat: Heartbeat) -> Self {
        Self {
            conn_id,
            hub,
            conn,
            phase: IngestPhase::Connected,
            _heartbeat: heartbeat,
        }
    }

    pub(crate) async fn run(mut self, mut stream: SplitStream<WebSocket>) {
        self.phase = IngestPhase::AwaitingHandshake;

        let (meta, encoder) = match self.await_handshake(&mut stream).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(conn_id = self.conn_id, error = %e, "Ingest handshake rejected");
                self.phase = IngestPhase::Closed;
                self.conn.close().await;
                return;
            }
        };

        let device_id = meta.device_id.clone();
        let room = meta.room.clone();
        let registry = self.hub.registry();

        let displaced = registry
            .register_ingest(meta.clone(), self.conn_id, Arc::clone(&self.conn))
            .await;
        // Closed outside the registry lock; it may still receive one last
        // broadcast between the swap and this close, which is acceptable for
        // best-effort delivery.
        if let Some(old) = displaced {
            old.close().await;
        }

        let event_deadline = self.hub.config().event_send_timeout;
        let viewers = registry.viewers_of(&room).await;
        if !viewers.is_empty() {
            broadcast_event(&viewers, &Event::Join { stream: meta }, event_deadline).await;
        }

        self.phase = IngestPhase::Streaming;
        tracing::info!(device = %device_id, room = %room, conn_id = self.conn_id, "Ingest streaming");

        let read_deadline = self.hub.config().read_deadline;
        loop {
            match tokio::time::timeout(read_deadline, stream.next()).await {
                Err(_) => {
                    tracing::debug!(device = %device_id, conn_id = self.conn_id, "Read deadline expired");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::debug!(device = %device_id, conn_id = self.conn_id, error = %e, "Read failed");
                    break;
                }
                Ok(Some(Ok(Message::Binary(frame)))) => {
                    self.relay_frame(&encoder, &room, frame).await;
                }
                Ok(Some(Ok(Message::Close(_)))) => break,
                // Text and control messages from a producer carry no meaning;
                // they only refresh the read deadline.
                Ok(Some(Ok(_))) => {}
            }
        }

        self.phase = IngestPhase::Closed;
        if registry.unregister_ingest(&device_id, self.conn_id).await {
            let viewers = registry.viewers_of(&room).await;
            if !viewers.is_empty() {
                let leave = Event::Leave {
                    device_id: device_id.clone(),
                };
                broadcast_event(&viewers, &leave, event_deadline).await;
            }
        }
        self.conn.close().await;
        tracing::info!(device = %device_id, conn_id = self.conn_id, "Ingest session closed");
        debug_assert!(self.phase.is_terminal());
    }

    /// Read and validate the single handshake message.
    ///
    /// Any failure here discards the connection without touching the
    /// registry.
    async fn await_handshake(
        &self,
        stream: &mut SplitStream<WebSocket>,
    ) -> Result<(StreamMeta, FrameEncoder)> {
        let config = self.hub.config();

        let raw = tokio::time::timeout(config.handshake_timeout, async {
            loop {
                match stream.next().await {
                    None => return Err(Error::Handshake(HandshakeError::Closed)),
                    Some(Err(e)) => return Err(Error::Transport(e)),
                    Some(Ok(Message::Text(text))) => {
                        return Ok(Bytes::copy_from_slice(text.as_bytes()))
                    }
                    Some(Ok(Message::Binary(raw))) => return Ok(raw),
                    Some(Ok(Message::Close(_))) => {
                        return Err(Error::Handshake(HandshakeError::Closed))
                    }
                    // Control frames may precede the handshake.
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await
        .map_err(|_| Error::Handshake(HandshakeError::TimedOut))??;

        let meta = StreamMeta::from_handshake(&raw)?.normalize(&config.default_room)?;
        let encoder = FrameEncoder::new(&meta.device_id)
            .map_err(|_| HandshakeError::DeviceIdTooLong(meta.device_id.len()))?;

        Ok((meta, encoder))
    }

    /// Encode one frame and fan it out to the room's current viewers.
    async fn relay_frame(&self, encoder: &FrameEncoder, room: &str, frame: Bytes) {
        let payload = encoder.encode(&frame);

        let registry = self.hub.registry();
        let viewers = registry.viewers_of(room).await;
        if viewers.is_empty() {
            return;
        }

        let failed =
            broadcast_frame(&viewers, payload, self.hub.config().frame_send_timeout).await;
        for (conn_id, conn) in failed {
            registry.unregister_viewer(room, conn_id).await;
            conn.close().await;
            tracing::debug!(room = %room, conn_id, "Viewer evicted after failed delivery");
        }
    }
}
