//! Wire-level data model
//!
//! JSON payloads exchanged with producers and viewers: the ingest handshake,
//! room events, and the manifest. Binary frame framing lives in [`crate::mux`].

use serde::{Deserialize, Serialize};

use crate::error::HandshakeError;
use crate::mux::MAX_DEVICE_ID_LEN;

/// Room used when a producer or viewer does not name one.
pub const DEFAULT_ROOM: &str = "home";

/// Metadata describing one camera stream
///
/// Sent by the producer as the first (and only) JSON message on an ingest
/// connection, then echoed to viewers inside manifest and join events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMeta {
    /// Unique device identifier (non-empty, at most 65535 bytes of UTF-8)
    pub device_id: String,

    /// Room the stream belongs to (defaulted when blank)
    #[serde(default)]
    pub room: String,

    /// Frame width in pixels
    #[serde(default)]
    pub width: u32,

    /// Frame height in pixels
    #[serde(default)]
    pub height: u32,

    /// Nominal frames per second
    #[serde(default)]
    pub fps: u32,

    /// Unix millis of the last registration (0 = never stamped)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub last_seen: i64,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl StreamMeta {
    /// Parse an ingest handshake payload.
    pub fn from_handshake(raw: &[u8]) -> Result<Self, HandshakeError> {
        serde_json::from_slice(raw).map_err(HandshakeError::Malformed)
    }

    /// Validate the handshake fields and fill in the default room.
    ///
    /// Rejects an empty `device_id` and one that would not fit the frame
    /// header's 2-byte length prefix.
    pub fn normalize(mut self, default_room: &str) -> Result<Self, HandshakeError> {
        if self.device_id.is_empty() {
            return Err(HandshakeError::EmptyDeviceId);
        }
        if self.device_id.len() > MAX_DEVICE_ID_LEN {
            return Err(HandshakeError::DeviceIdTooLong(self.device_id.len()));
        }
        if self.room.trim().is_empty() {
            self.room = default_room.to_string();
        }
        Ok(self)
    }
}

/// Room event pushed to viewer connections as JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// A stream registered in the viewer's room
    Join { stream: StreamMeta },
    /// A stream left the viewer's room
    Leave { device_id: String },
    /// Initial snapshot of the room's streams, sent once on registration
    Manifest { streams: Vec<StreamMeta> },
}

impl Event {
    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> String {
        // Event carries no map keys or non-string keys, serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Body of the point-in-time HTTP manifest query.
///
/// The field is named `stream` (singular) on this endpoint while the viewer
/// manifest event uses `streams`; both spellings are part of the wire
/// contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceManifest {
    #[serde(rename = "type")]
    pub kind: String,
    pub stream: Vec<StreamMeta>,
}

impl DeviceManifest {
    pub fn new(stream: Vec<StreamMeta>) -> Self {
        Self {
            kind: "manifest".to_string(),
            stream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(device_id: &str, room: &str) -> StreamMeta {
        StreamMeta {
            device_id: device_id.to_string(),
            room: room.to_string(),
            width: 1280,
            height: 720,
            fps: 30,
            last_seen: 0,
        }
    }

    #[test]
    fn test_handshake_parse() {
        let raw = br#"{"device_id":"cam1","room":"home","width":1920,"height":1080,"fps":24}"#;
        let meta = StreamMeta::from_handshake(raw).unwrap();

        assert_eq!(meta.device_id, "cam1");
        assert_eq!(meta.room, "home");
        assert_eq!(meta.width, 1920);
        assert_eq!(meta.height, 1080);
        assert_eq!(meta.fps, 24);
    }

    #[test]
    fn test_handshake_missing_fields_default() {
        let raw = br#"{"device_id":"cam1"}"#;
        let meta = StreamMeta::from_handshake(raw).unwrap();

        assert_eq!(meta.room, "");
        assert_eq!(meta.width, 0);
        assert_eq!(meta.fps, 0);
    }

    #[test]
    fn test_handshake_bad_json() {
        assert!(matches!(
            StreamMeta::from_handshake(b"not json"),
            Err(HandshakeError::Malformed(_))
        ));
    }

    #[test]
    fn test_normalize_defaults_blank_room() {
        let blank = meta("cam1", "  ").normalize(DEFAULT_ROOM).unwrap();
        assert_eq!(blank.room, DEFAULT_ROOM);

        let named = meta("cam1", "garage").normalize(DEFAULT_ROOM).unwrap();
        assert_eq!(named.room, "garage");
    }

    #[test]
    fn test_normalize_rejects_empty_device_id() {
        assert!(matches!(
            meta("", "home").normalize(DEFAULT_ROOM),
            Err(HandshakeError::EmptyDeviceId)
        ));
    }

    #[test]
    fn test_normalize_rejects_oversized_device_id() {
        let long = "x".repeat(MAX_DEVICE_ID_LEN + 1);
        assert!(matches!(
            meta(&long, "home").normalize(DEFAULT_ROOM),
            Err(HandshakeError::DeviceIdTooLong(_))
        ));
    }

    #[test]
    fn test_last_seen_omitted_when_zero() {
        let json = serde_json::to_string(&meta("cam1", "home")).unwrap();
        assert!(!json.contains("last_seen"));

        let mut stamped = meta("cam1", "home");
        stamped.last_seen = 1_700_000_000_000;
        let json = serde_json::to_string(&stamped).unwrap();
        assert!(json.contains("\"last_seen\":1700000000000"));
    }

    #[test]
    fn test_event_tagging() {
        let join = Event::Join {
            stream: meta("cam1", "home"),
        };
        let json = join.to_json();
        assert!(json.starts_with(r#"{"type":"join""#));

        let leave = Event::Leave {
            device_id: "cam1".to_string(),
        };
        assert_eq!(leave.to_json(), r#"{"type":"leave","device_id":"cam1"}"#);

        let manifest = Event::Manifest { streams: vec![] };
        assert_eq!(manifest.to_json(), r#"{"type":"manifest","streams":[]}"#);
    }

    #[test]
    fn test_event_round_trip() {
        let event = Event::Join {
            stream: meta("cam1", "home"),
        };
        let parsed: Event = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_device_manifest_uses_singular_key() {
        let json = serde_json::to_string(&DeviceManifest::new(vec![meta("cam1", "home")])).unwrap();
        assert!(json.contains(r#""type":"manifest""#));
        assert!(json.contains(r#""stream":["#));
        assert!(!json.contains(r#""streams""#));
    }
}
