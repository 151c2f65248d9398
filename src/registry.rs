//! Connection registry
//!
//! The single consistency domain for routing state: which viewer connections
//! are in which room, which connection produces which device's stream, and
//! each device's metadata. All three maps live behind one `RwLock` and are
//! only ever touched through this type.
//!
//! Lock discipline: the lock is held for map reads/writes only, never across
//! network I/O. Every operation that feeds a broadcast returns a point-in-time
//! snapshot taken under the lock; callers perform sends after release, so a
//! slow or dead peer can never stall registry access for unrelated rooms or
//! devices.
//!
//! The registry is generic over the connection handle it routes. Production
//! code stores `Arc<Conn>`; tests substitute plain values.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

use crate::protocol::StreamMeta;

/// Registered producer connection for one device
struct Producer<C> {
    conn_id: u64,
    conn: C,
}

struct Inner<C> {
    /// room -> conn_id -> viewer connection
    viewers: HashMap<String, HashMap<u64, C>>,
    /// device_id -> producer connection
    ingest: HashMap<String, Producer<C>>,
    /// device_id -> stream metadata; an entry exists iff the device has a
    /// registered producer
    metas: HashMap<String, StreamMeta>,
}

/// Room/device routing state, guarded by a single reader/writer lock
pub struct Registry<C> {
    inner: RwLock<Inner<C>>,
}

impl<C: Clone> Registry<C> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                viewers: HashMap::new(),
                ingest: HashMap::new(),
                metas: HashMap::new(),
            }),
        }
    }

    /// Install `conn` as the live producer for `meta.device_id`.
    ///
    /// Stamps `last_seen` and stores the metadata. Returns the previous
    /// connection if the device was already registered (a reconnect); the
    /// caller must close it after this call returns, never while a registry
    /// lock could be re-entered.
    pub async fn register_ingest(&self, mut meta: StreamMeta, conn_id: u64, conn: C) -> Option<C> {
        let device_id = meta.device_id.clone();
        meta.last_seen = now_millis();

        let mut inner = self.inner.write().await;
        let previous = inner.ingest.insert(device_id.clone(), Producer { conn_id, conn });
        inner.metas.insert(device_id.clone(), meta);

        let displaced = previous.filter(|p| p.conn_id != conn_id);
        if displaced.is_some() {
            tracing::info!(device = %device_id, conn_id, "Producer reconnected, displacing previous connection");
        } else {
            tracing::info!(device = %device_id, conn_id, "Producer registered");
        }

        displaced.map(|p| p.conn)
    }

    /// Remove the device's producer and metadata, but only if `conn_id` still
    /// owns the entry.
    ///
    /// A session displaced by a reconnect runs its cleanup after the new
    /// session has registered; the ownership check keeps it from erasing its
    /// successor. Returns whether the entry was removed. Idempotent.
    pub async fn unregister_ingest(&self, device_id: &str, conn_id: u64) -> bool {
        let mut inner = self.inner.write().await;

        match inner.ingest.get(device_id) {
            Some(p) if p.conn_id == conn_id => {
                inner.ingest.remove(device_id);
                inner.metas.remove(device_id);
                tracing::info!(device = %device_id, conn_id, "Producer unregistered");
                true
            }
            Some(p) => {
                tracing::debug!(
                    device = %device_id,
                    owner = p.conn_id,
                    conn_id,
                    "Skipping unregister, device owned by newer connection"
                );
                false
            }
            None => false,
        }
    }

    /// Add a viewer to `room` and return the room's current manifest.
    ///
    /// The manifest snapshot and the registration happen under one lock
    /// acquisition, so the snapshot plus subsequent join events cover every
    /// stream exactly once.
    pub async fn register_viewer(&self, room: &str, conn_id: u64, conn: C) -> Vec<StreamMeta> {
        let mut inner = self.inner.write().await;
        inner
            .viewers
            .entry(room.to_string())
            .or_default()
            .insert(conn_id, conn);

        let manifest: Vec<StreamMeta> = inner
            .metas
            .values()
            .filter(|m| m.room == room)
            .cloned()
            .collect();

        tracing::info!(room = %room, conn_id, streams = manifest.len(), "Viewer registered");
        manifest
    }

    /// Remove a viewer from `room`. Idempotent; no-op if absent.
    pub async fn unregister_viewer(&self, room: &str, conn_id: u64) {
        let mut inner = self.inner.write().await;
        let drained = match inner.viewers.get_mut(room) {
            Some(set) => {
                if set.remove(&conn_id).is_some() {
                    tracing::info!(room = %room, conn_id, "Viewer unregistered");
                }
                set.is_empty()
            }
            None => false,
        };
        // Rooms exist only as map keys; an empty set is garbage.
        if drained {
            inner.viewers.remove(room);
        }
    }

    /// Point-in-time snapshot of the viewer connections in `room`.
    pub async fn viewers_of(&self, room: &str) -> Vec<(u64, C)> {
        let inner = self.inner.read().await;
        inner
            .viewers
            .get(room)
            .map(|set| set.iter().map(|(id, c)| (*id, c.clone())).collect())
            .unwrap_or_default()
    }

    /// Snapshot of all registered stream metadata across rooms.
    pub async fn all_meta(&self) -> Vec<StreamMeta> {
        let inner = self.inner.read().await;
        inner.metas.values().cloned().collect()
    }

    /// Number of registered producer devices.
    pub async fn device_count(&self) -> usize {
        self.inner.read().await.ingest.len()
    }

    /// Number of viewers in `room`.
    pub async fn viewer_count(&self, room: &str) -> usize {
        let inner = self.inner.read().await;
        inner.viewers.get(room).map(HashMap::len).unwrap_or(0)
    }
}

impl<C: Clone> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(device_id: &str, room: &str) -> StreamMeta {
        StreamMeta {
            device_id: device_id.to_string(),
            room: room.to_string(),
            width: 640,
            height: 480,
            fps: 30,
            last_seen: 0,
        }
    }

    #[tokio::test]
    async fn test_register_unregister_ingest() {
        let registry: Registry<&str> = Registry::new();

        let prev = registry.register_ingest(meta("cam1", "home"), 1, "conn-a").await;
        assert!(prev.is_none());
        assert_eq!(registry.device_count().await, 1);

        let removed = registry.unregister_ingest("cam1", 1).await;
        assert!(removed);
        assert_eq!(registry.device_count().await, 0);
        assert!(registry.all_meta().await.is_empty());

        // Idempotent.
        assert!(!registry.unregister_ingest("cam1", 1).await);
    }

    #[tokio::test]
    async fn test_register_stamps_last_seen() {
        let registry: Registry<&str> = Registry::new();
        registry.register_ingest(meta("cam1", "home"), 1, "conn-a").await;

        let all = registry.all_meta().await;
        assert_eq!(all.len(), 1);
        assert!(all[0].last_seen > 0);
    }

    #[tokio::test]
    async fn test_reconnect_returns_displaced_connection() {
        let registry: Registry<&str> = Registry::new();

        registry.register_ingest(meta("cam1", "home"), 1, "conn-a").await;
        let prev = registry.register_ingest(meta("cam1", "home"), 2, "conn-b").await;

        assert_eq!(prev, Some("conn-a"));
        assert_eq!(registry.device_count().await, 1);
    }

    #[tokio::test]
    async fn test_displaced_session_cannot_erase_successor() {
        let registry: Registry<&str> = Registry::new();

        registry.register_ingest(meta("cam1", "home"), 1, "conn-a").await;
        registry.register_ingest(meta("cam1", "home"), 2, "conn-b").await;

        // The displaced session's cleanup runs after the swap.
        assert!(!registry.unregister_ingest("cam1", 1).await);
        assert_eq!(registry.device_count().await, 1);
        assert_eq!(registry.all_meta().await.len(), 1);

        assert!(registry.unregister_ingest("cam1", 2).await);
        assert_eq!(registry.device_count().await, 0);
    }

    #[tokio::test]
    async fn test_viewer_manifest_snapshot() {
        let registry: Registry<&str> = Registry::new();

        registry.register_ingest(meta("cam1", "home"), 1, "c1").await;
        registry.register_ingest(meta("cam2", "home"), 2, "c2").await;
        registry.register_ingest(meta("cam3", "garage"), 3, "c3").await;

        let manifest = registry.register_viewer("home", 10, "v1").await;
        let mut ids: Vec<&str> = manifest.iter().map(|m| m.device_id.as_str()).collect();
        ids.sort_unstable();

        assert_eq!(ids, ["cam1", "cam2"]);
        assert_eq!(registry.viewer_count("home").await, 1);
    }

    #[tokio::test]
    async fn test_empty_room_manifest() {
        let registry: Registry<&str> = Registry::new();
        let manifest = registry.register_viewer("home", 10, "v1").await;
        assert!(manifest.is_empty());
    }

    #[tokio::test]
    async fn test_viewers_of_snapshot() {
        let registry: Registry<&str> = Registry::new();

        registry.register_viewer("home", 10, "v1").await;
        registry.register_viewer("home", 11, "v2").await;
        registry.register_viewer("garage", 12, "v3").await;

        let mut home = registry.viewers_of("home").await;
        home.sort_by_key(|(id, _)| *id);

        assert_eq!(home, vec![(10, "v1"), (11, "v2")]);
        assert!(registry.viewers_of("attic").await.is_empty());
    }

    #[tokio::test]
    async fn test_unregister_viewer_prunes_empty_room() {
        let registry: Registry<&str> = Registry::new();

        registry.register_viewer("home", 10, "v1").await;
        registry.unregister_viewer("home", 10).await;

        assert_eq!(registry.viewer_count("home").await, 0);
        assert!(registry.viewers_of("home").await.is_empty());

        // No-op on absent viewer or room.
        registry.unregister_viewer("home", 10).await;
        registry.unregister_viewer("nowhere", 99).await;
    }

    #[tokio::test]
    async fn test_meta_tracks_producer_lifetime() {
        let registry: Registry<&str> = Registry::new();

        registry.register_ingest(meta("cam1", "home"), 1, "c1").await;
        assert_eq!(registry.all_meta().await.len(), 1);

        registry.unregister_ingest("cam1", 1).await;
        assert!(registry.all_meta().await.is_empty());
    }
}
