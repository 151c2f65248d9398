//! Crate error types

use std::time::Duration;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
///
/// Transport-level failures are treated uniformly as disconnects by session
/// handlers; none of these variants ever terminates the hub process.
#[derive(Debug)]
pub enum Error {
    /// I/O error (bind, accept)
    Io(std::io::Error),
    /// WebSocket transport error
    Transport(axum::Error),
    /// Outbound send did not complete within its deadline
    SendTimeout(Duration),
    /// Send attempted on a connection already marked closed
    ConnectionClosed,
    /// Ingest handshake failed
    Handshake(HandshakeError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "i/o error: {}", e),
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::SendTimeout(d) => write!(f, "send timed out after {:?}", d),
            Error::ConnectionClosed => write!(f, "connection closed"),
            Error::Handshake(e) => write!(f, "handshake failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Transport(e) => Some(e),
            Error::Handshake(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<axum::Error> for Error {
    fn from(e: axum::Error) -> Self {
        Error::Transport(e)
    }
}

impl From<HandshakeError> for Error {
    fn from(e: HandshakeError) -> Self {
        Error::Handshake(e)
    }
}

/// Why an ingest handshake was rejected
///
/// Fatal to that connection only; the registry is never touched before the
/// handshake completes.
#[derive(Debug)]
pub enum HandshakeError {
    /// Peer disconnected before sending the handshake message
    Closed,
    /// Handshake message did not arrive within the configured timeout
    TimedOut,
    /// Handshake payload was not valid StreamMeta JSON
    Malformed(serde_json::Error),
    /// `device_id` was empty
    EmptyDeviceId,
    /// `device_id` exceeds the frame header's 2-byte length prefix
    DeviceIdTooLong(usize),
}

impl std::fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandshakeError::Closed => write!(f, "connection closed before handshake"),
            HandshakeError::TimedOut => write!(f, "handshake timed out"),
            HandshakeError::Malformed(e) => write!(f, "bad meta: {}", e),
            HandshakeError::EmptyDeviceId => write!(f, "empty device_id"),
            HandshakeError::DeviceIdTooLong(len) => {
                write!(f, "device_id too long: {} bytes", len)
            }
        }
    }
}

impl std::error::Error for HandshakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandshakeError::Malformed(e) => Some(e),
            _ => None,
        }
    }
}
