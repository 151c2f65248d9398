//! Relay server: configuration and the HTTP/WS surface

pub mod config;
pub mod listener;

pub use config::HubConfig;
pub use listener::{router, IngestParams, RelayServer, ViewerParams};
