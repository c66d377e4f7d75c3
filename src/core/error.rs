//! Error types for the datagram engine.

use std::fmt;

use thiserror::Error;

use super::MAX_CLOSE_REASON_LEN;

/// Application-visible information about why a session ended.
///
/// Carried by a CLOSE_WEBTRANSPORT_SESSION capsule on the wire. The reason is
/// bounded by [`MAX_CLOSE_REASON_LEN`] bytes; longer reasons are cut at a
/// character boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseInfo {
    /// Application error code (0 means no error).
    pub code: u32,
    /// Human-readable reason.
    pub reason: String,
}

impl CloseInfo {
    /// Create close info with the given code and reason.
    pub fn new(code: u32, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
        .truncated()
    }

    /// Cut the reason to at most [`MAX_CLOSE_REASON_LEN`] bytes without
    /// splitting a UTF-8 character.
    pub fn truncated(mut self) -> Self {
        if self.reason.len() > MAX_CLOSE_REASON_LEN {
            let mut end = MAX_CLOSE_REASON_LEN;
            while !self.reason.is_char_boundary(end) {
                end -= 1;
            }
            self.reason.truncate(end);
        }
        self
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "code {}", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.reason)
        }
    }
}

/// Terminal session errors.
///
/// Delivered once to every suspended caller and then to every new call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The underlying connection never became usable, or broke.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The session was closed by either side.
    #[error("connection closed ({0})")]
    ConnectionClosed(CloseInfo),
}

impl SessionError {
    /// Check if this is a graceful close rather than a failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionError::ConnectionClosed(_))
    }

    /// Close info, if the session ended gracefully.
    pub fn close_info(&self) -> Option<&CloseInfo> {
        match self {
            SessionError::ConnectionClosed(info) => Some(info),
            SessionError::ConnectionFailed(_) => None,
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// High-water marks must admit at least one datagram.
    #[error("{queue} high-water mark must be greater than zero")]
    ZeroHighWaterMark {
        /// Which queue was misconfigured ("outgoing" or "incoming").
        queue: &'static str,
    },

    /// Maximum datagram size must be positive.
    #[error("max datagram size must be greater than zero")]
    ZeroMaxDatagramSize,
}

/// Top-level errors.
#[derive(Debug, Error)]
pub enum WtError {
    /// Session error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
