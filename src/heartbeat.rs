//! Connection liveness probing
//!
//! One ticker per accepted connection sends a WebSocket ping through the
//! write gate at a fixed interval. The matching read-inactivity deadline is
//! applied by the owning session around every receive; a peer that neither
//! sends data nor answers pings turns into an ordinary read failure within
//! one deadline window, which drives the session's normal cleanup path.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::conn::MessageSink;

/// Periodic ping task for one connection
///
/// Aborted when dropped, so a session releases its ticker simply by letting
/// the handle go out of scope.
pub struct Heartbeat {
    task: JoinHandle<()>,
}

impl Heartbeat {
    /// Start pinging `sink` every `interval`.
    pub fn start<S>(sink: Arc<S>, interval: Duration, send_deadline: Duration) -> Self
    where
        S: MessageSink + 'static,
    {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the peer just connected.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = sink.send_ping(send_deadline).await {
                    tracing::debug!(conn_id = sink.id(), error = %e, "Ping failed, stopping heartbeat");
                    break;
                }
            }
        });

        Self { task }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.task.abort();
    }
}
