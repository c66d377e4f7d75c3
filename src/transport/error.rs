//! Transport layer error types.

use std::io;

use thiserror::Error;

#[cfg(feature = "capsule")]
use super::capsule::CapsuleError;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Capsule decoding error.
    #[cfg(feature = "capsule")]
    #[error("capsule error: {0}")]
    Capsule(#[from] CapsuleError),

    /// I/O error (socket or stream operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The peer refused the connection.
    #[error("connection refused: {0}")]
    Refused(String),

    /// The link is gone.
    #[error("connection closed")]
    ConnectionClosed,

    /// Datagram does not fit the link's frame size.
    #[error("datagram too large: {size} bytes (max {max})")]
    DatagramTooLarge {
        /// Size of the rejected datagram.
        size: usize,
        /// Largest size the link carries.
        max: usize,
    },
}

impl TransportError {
    /// Check if this error ends the session.
    ///
    /// Non-fatal errors affect a single datagram, which is then lost like any
    /// other unreliable datagram.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::DatagramTooLarge { .. } => false,
            TransportError::Io(e) => !matches!(
                e.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
            _ => true,
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
