//! WebSocket camera relay hub
//!
//! Relays live camera frames from many producer devices to many viewers,
//! grouped into named rooms, over one WebSocket per connection. Producers
//! send one JSON handshake then a stream of opaque binary frames; viewers
//! receive a manifest, join/leave events and multiplexed frames for every
//! device in their room.
//!
//! # Architecture
//!
//! ```text
//!  camera ──ws──► IngestSession ─┐
//!  camera ──ws──► IngestSession ─┤        Registry (one RwLock)
//!                                ├──► room -> viewers
//!                                │    device -> conn, meta
//!                                │
//!                   viewers_of() snapshot, lock released
//!                                │
//!                                ▼
//!                  per-viewer write gate (Conn)
//!                                │
//!  viewer ◄──ws── ViewerSession ◄┘   frames: [u16 id len][id][payload]
//! ```
//!
//! Fan-out never holds the registry lock across network I/O, every
//! connection's outbound traffic is serialized through its own write gate,
//! and a heartbeat ticker per connection turns silent peers into ordinary
//! disconnects.
//!
//! # Quick start
//!
//! ```no_run
//! use camhub::{HubConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> camhub::Result<()> {
//!     let server = RelayServer::new(HubConfig::default());
//!     server.run().await
//! }
//! ```

pub mod conn;
pub mod error;
pub mod heartbeat;
pub mod hub;
pub mod mux;
pub mod protocol;
pub mod registry;
pub mod server;

mod session;

pub use error::{Error, HandshakeError, Result};
pub use hub::Hub;
pub use protocol::{DeviceManifest, Event, StreamMeta, DEFAULT_ROOM};
pub use registry::Registry;
pub use server::{HubConfig, RelayServer};
