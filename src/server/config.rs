//! Hub configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::DEFAULT_ROOM;

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Room assigned when a producer or viewer does not name one
    pub default_room: String,

    /// Interval between liveness pings on every connection
    pub ping_interval: Duration,

    /// Read-inactivity deadline; a peer silent for this long is disconnected
    pub read_deadline: Duration,

    /// The ingest handshake message must arrive within this window
    pub handshake_timeout: Duration,

    /// Send deadline for JSON events, manifests and pings
    pub event_send_timeout: Duration,

    /// Send deadline for relayed frames; short so one stalled viewer cannot
    /// hold up a broadcast pass
    pub frame_send_timeout: Duration,

    /// Maximum inbound message size on ingest connections
    pub max_frame_size: usize,

    /// Maximum inbound message size on viewer connections, which only ever
    /// send control traffic
    pub max_viewer_message_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 6699).into(),
            default_room: DEFAULT_ROOM.to_string(),
            ping_interval: Duration::from_secs(30),
            read_deadline: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(10),
            event_send_timeout: Duration::from_secs(5),
            frame_send_timeout: Duration::from_millis(500),
            max_frame_size: 1 << 20, // 1MB
            max_viewer_message_size: 1 << 10,
        }
    }
}

impl HubConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the default room name
    pub fn default_room(mut self, room: impl Into<String>) -> Self {
        self.default_room = room.into();
        self
    }

    /// Set the liveness ping interval
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the read-inactivity deadline
    pub fn read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the frame send deadline
    pub fn frame_send_timeout(mut self, timeout: Duration) -> Self {
        self.frame_send_timeout = timeout;
        self
    }

    /// Set the maximum ingest message size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.bind_addr.port(), 6699);
        assert_eq!(config.default_room, DEFAULT_ROOM);
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.read_deadline, Duration::from_secs(60));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.max_frame_size, 1 << 20);
        assert!(config.frame_send_timeout < config.event_send_timeout);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        let config = HubConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:6700".parse().unwrap();
        let config = HubConfig::default()
            .bind(addr)
            .default_room("lobby")
            .ping_interval(Duration::from_secs(10))
            .read_deadline(Duration::from_secs(20))
            .handshake_timeout(Duration::from_secs(3))
            .frame_send_timeout(Duration::from_millis(250))
            .max_frame_size(1 << 22);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.default_room, "lobby");
        assert_eq!(config.ping_interval, Duration::from_secs(10));
        assert_eq!(config.read_deadline, Duration::from_secs(20));
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.frame_send_timeout, Duration::from_millis(250));
        assert_eq!(config.max_frame_size, 1 << 22);
    }
}
