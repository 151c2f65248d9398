//! Connection-lifetime session handlers
//!
//! One session per accepted connection, running in its own task. The ingest
//! session drives a producer's handshake, frame relay loop and cleanup; the
//! viewer session registers, delivers the initial manifest and then only
//! watches for disconnect. All frame and event delivery to a viewer happens
//! from producer sessions, never from the viewer's own loop.

pub(crate) mod ingest;
pub(crate) mod state;
pub(crate) mod viewer;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::conn::MessageSink;
use crate::protocol::Event;

/// Send an event to every viewer in the snapshot.
///
/// Best-effort: failures are logged and counted, recipients are not evicted.
/// The event is serialized once and the sends run serially through each
/// connection's write gate.
pub(crate) async fn broadcast_event<S>(
    viewers: &[(u64, Arc<S>)],
    event: &Event,
    deadline: Duration,
) -> usize
where
    S: MessageSink + ?Sized,
{
    let json = event.to_json();
    let mut failures = 0;

    for (conn_id, conn) in viewers {
        if let Err(e) = conn.send_text(json.clone(), deadline).await {
            tracing::debug!(conn_id, error = %e, "Event delivery failed");
            failures += 1;
        }
    }

    failures
}

/// Send a multiplexed frame to every viewer in the snapshot.
///
/// Returns the viewers whose send failed so the caller can evict and close
/// them once the pass completes. One failing or stalled viewer never stops
/// delivery to the rest.
pub(crate) async fn broadcast_frame<S>(
    viewers: &[(u64, Arc<S>)],
    payload: Bytes,
    deadline: Duration,
) -> Vec<(u64, Arc<S>)>
where
    S: MessageSink + ?Sized,
{
    let mut failed = Vec::new();

    for (conn_id, conn) in viewers {
        if conn.send_binary(payload.clone(), deadline).await.is_err() {
            failed.push((*conn_id, Arc::clone(conn)));
        }
    }

    failed
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::error::{Error, Result};
    use crate::protocol::StreamMeta;

    struct StubSink {
        id: u64,
        fail: bool,
        binaries: Mutex<Vec<Bytes>>,
        texts: Mutex<Vec<String>>,
    }

    impl StubSink {
        fn healthy(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id,
                fail: false,
                binaries: Mutex::new(Vec::new()),
                texts: Mutex::new(Vec::new()),
            })
        }

        fn failing(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id,
                fail: true,
                binaries: Mutex::new(Vec::new()),
                texts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageSink for StubSink {
        fn id(&self) -> u64 {
            self.id
        }

        async fn send_text(&self, text: String, _deadline: Duration) -> Result<()> {
            if self.fail {
                return Err(Error::ConnectionClosed);
            }
            self.texts.lock().await.push(text);
            Ok(())
        }

        async fn send_binary(&self, payload: Bytes, _deadline: Duration) -> Result<()> {
            if self.fail {
                return Err(Error::ConnectionClosed);
            }
            self.binaries.lock().await.push(payload);
            Ok(())
        }

        async fn send_ping(&self, _deadline: Duration) -> Result<()> {
            Ok(())
        }

        async fn close(&self) {}
    }

    const DEADLINE: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_broadcast_frame_isolates_failures() {
        let healthy = StubSink::healthy(1);
        let failing = StubSink::failing(2);
        let viewers = vec![(2, Arc::clone(&failing)), (1, Arc::clone(&healthy))];

        let payload = crate::mux::encode_frame("cam1", &[0xAA; 64]).unwrap();
        let failed = broadcast_frame(&viewers, payload.clone(), DEADLINE).await;

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, 2);

        let delivered = healthy.binaries.lock().await;
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0], payload);

        let (id, body) = crate::mux::decode_frame(&delivered[0]).unwrap();
        assert_eq!(id, "cam1");
        assert_eq!(body, &[0xAA; 64]);
    }

    #[tokio::test]
    async fn test_broadcast_frame_all_healthy() {
        let a = StubSink::healthy(1);
        let b = StubSink::healthy(2);
        let viewers = vec![(1, Arc::clone(&a)), (2, Arc::clone(&b))];

        let failed = broadcast_frame(&viewers, Bytes::from_static(b"frame"), DEADLINE).await;

        assert!(failed.is_empty());
        assert_eq!(a.binaries.lock().await.len(), 1);
        assert_eq!(b.binaries.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_event_serializes_once_per_viewer() {
        let a = StubSink::healthy(1);
        let b = StubSink::failing(2);
        let viewers = vec![(1, Arc::clone(&a)), (2, Arc::clone(&b))];

        let event = Event::Join {
            stream: StreamMeta {
                device_id: "cam1".to_string(),
                room: "home".to_string(),
                width: 0,
                height: 0,
                fps: 0,
                last_seen: 0,
            },
        };
        let failures = broadcast_event(&viewers, &event, DEADLINE).await;

        assert_eq!(failures, 1);
        let texts = a.texts.lock().await;
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0], event.to_json());
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_room() {
        let viewers: Vec<(u64, Arc<StubSink>)> = Vec::new();
        let failed = broadcast_frame(&viewers, Bytes::from_static(b"frame"), DEADLINE).await;
        assert!(failed.is_empty());
    }
}
