//! Binary frame multiplexing
//!
//! Every frame relayed to a viewer is prefixed with the producing device's
//! identifier so one viewer connection can carry many streams:
//!
//! ```text
//! +----------------+-------------------+------------------------+
//! | u16 BE id len  | device id (UTF-8) | opaque frame payload   |
//! +----------------+-------------------+------------------------+
//! ```
//!
//! Each encoded frame maps to exactly one WebSocket binary message, so no
//! further boundary markers are needed. The payload is never inspected.

use bytes::{BufMut, Bytes, BytesMut};

/// Maximum device id length representable in the 2-byte header prefix.
pub const MAX_DEVICE_ID_LEN: usize = u16::MAX as usize;

/// Error type for frame encoding/decoding
#[derive(Debug)]
pub enum FrameCodecError {
    /// Device id does not fit the 2-byte length prefix
    DeviceIdTooLong(usize),
    /// Message is shorter than its header claims
    Truncated { expected: usize, actual: usize },
    /// Device id bytes are not valid UTF-8
    InvalidDeviceId(std::str::Utf8Error),
}

impl std::fmt::Display for FrameCodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameCodecError::DeviceIdTooLong(len) => {
                write!(f, "device id too long: {} bytes (max {})", len, MAX_DEVICE_ID_LEN)
            }
            FrameCodecError::Truncated { expected, actual } => {
                write!(f, "truncated frame: expected {} bytes, got {}", expected, actual)
            }
            FrameCodecError::InvalidDeviceId(e) => write!(f, "invalid device id: {}", e),
        }
    }
}

impl std::error::Error for FrameCodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameCodecError::InvalidDeviceId(e) => Some(e),
            _ => None,
        }
    }
}

/// Per-stream frame encoder
///
/// The header is fixed for the lifetime of an ingest session, so it is built
/// once and reused for every frame.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    header: Bytes,
}

impl FrameEncoder {
    /// Create an encoder for the given device id.
    pub fn new(device_id: &str) -> Result<Self, FrameCodecError> {
        let id = device_id.as_bytes();
        if id.len() > MAX_DEVICE_ID_LEN {
            return Err(FrameCodecError::DeviceIdTooLong(id.len()));
        }

        let mut header = BytesMut::with_capacity(2 + id.len());
        header.put_u16(id.len() as u16);
        header.put_slice(id);

        Ok(Self {
            header: header.freeze(),
        })
    }

    /// Prefix `payload` with the device id header.
    pub fn encode(&self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.header.len() + payload.len());
        buf.put_slice(&self.header);
        buf.put_slice(payload);
        buf.freeze()
    }
}

/// Encode a single frame without reusing an encoder.
pub fn encode_frame(device_id: &str, payload: &[u8]) -> Result<Bytes, FrameCodecError> {
    Ok(FrameEncoder::new(device_id)?.encode(payload))
}

/// Decode a multiplexed frame into its device id and opaque payload.
///
/// This is the contract the consuming side relies on; the hub itself only
/// encodes.
pub fn decode_frame(frame: &[u8]) -> Result<(&str, &[u8]), FrameCodecError> {
    if frame.len() < 2 {
        return Err(FrameCodecError::Truncated {
            expected: 2,
            actual: frame.len(),
        });
    }

    let id_len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    if frame.len() < 2 + id_len {
        return Err(FrameCodecError::Truncated {
            expected: 2 + id_len,
            actual: frame.len(),
        });
    }

    let device_id =
        std::str::from_utf8(&frame[2..2 + id_len]).map_err(FrameCodecError::InvalidDeviceId)?;

    Ok((device_id, &frame[2 + id_len..]))
}
