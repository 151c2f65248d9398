//! Per-connection write serialization
//!
//! A WebSocket connection is not safe for concurrent senders: the frame
//! relay path, room event broadcasts and the heartbeat ticker may all try to
//! write to the same peer at once. [`Conn`] wraps the sink half of one
//! connection behind a single async mutex so at most one outbound message is
//! in flight per connection, with a bounded deadline on every send.
//!
//! [`MessageSink`] is the seam the fan-out and heartbeat code is written
//! against, so delivery behavior can be exercised without sockets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Outbound half of a duplex message connection
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Connection identity, stable for the connection's lifetime.
    fn id(&self) -> u64;

    /// Send a JSON text message.
    async fn send_text(&self, text: String, deadline: Duration) -> Result<()>;

    /// Send a binary message.
    async fn send_binary(&self, payload: Bytes, deadline: Duration) -> Result<()>;

    /// Send a liveness probe.
    async fn send_ping(&self, deadline: Duration) -> Result<()>;

    /// Close the connection. Idempotent; subsequent sends fail fast.
    async fn close(&self);
}

/// Write gate over the sink half of one WebSocket
///
/// Owned by the session that accepted the connection; the registry only holds
/// `Arc` references for routing. Dropped (and with it the gate) when the
/// session ends.
pub struct Conn {
    id: u64,
    gate: Mutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

impl Conn {
    pub fn new(id: u64, sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            id,
            gate: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether `close` has been observed on this connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn send(&self, msg: Message, deadline: Duration) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let mut sink = self.gate.lock().await;
        match tokio::time::timeout(deadline, sink.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Transport(e)),
            Err(_) => Err(Error::SendTimeout(deadline)),
        }
    }
}

#[async_trait]
impl MessageSink for Conn {
    fn id(&self) -> u64 {
        self.id
    }

    async fn send_text(&self, text: String, deadline: Duration) -> Result<()> {
        self.send(Message::Text(text.into()), deadline).await
    }

    async fn send_binary(&self, payload: Bytes, deadline: Duration) -> Result<()> {
        self.send(Message::Binary(payload), deadline).await
    }

    async fn send_ping(&self, deadline: Duration) -> Result<()> {
        self.send(Message::Ping(Bytes::new()), deadline).await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut sink = self.gate.lock().await;
        // Bounded: a wedged peer must not stall the closing session.
        let _ = tokio::time::timeout(Duration::from_secs(5), sink.close()).await;
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
