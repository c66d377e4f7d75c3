//! Session lifecycle state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::{CloseInfo, SessionError};

/// Connection state of a session.
///
/// ```text
/// Connecting ──► Ready ──► Closed
///     │            │
///     ├────────────┴─────► Failed
///     └──────────────────► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Connection establishment in progress; queues already usable.
    Connecting,
    /// The underlying connection is established.
    Ready,
    /// Closed by either side.
    Closed,
    /// The connection failed or could not be established.
    Failed,
}

impl SessionState {
    /// Check if the session has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Process-unique session identifier, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate the next identifier.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of the identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Everything observers of the lifecycle wait on.
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle {
    pub state: SessionState,
    /// Set once on the transition to Ready; never cleared.
    pub established: bool,
    /// Set once on the transition to Closed or Failed.
    pub terminal: Option<SessionError>,
    /// The close was requested by the local application.
    pub closed_locally: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
            established: false,
            terminal: None,
            closed_locally: false,
        }
    }

    /// Move to Ready. Only valid from Connecting.
    pub fn establish(&mut self) -> bool {
        if self.state != SessionState::Connecting {
            return false;
        }
        self.state = SessionState::Ready;
        self.established = true;
        true
    }

    /// Move to Closed or Failed. Only the first call has an effect.
    pub fn end(&mut self, err: SessionError, locally: bool) -> bool {
        if self.terminal.is_some() {
            return false;
        }
        self.state = if err.is_closed() {
            SessionState::Closed
        } else {
            SessionState::Failed
        };
        self.closed_locally = locally && err.is_closed();
        self.terminal = Some(err);
        true
    }

    /// Close info to send to the peer, if the application closed the session.
    pub fn local_close_info(&self) -> Option<CloseInfo> {
        if !self.closed_locally {
            return None;
        }
        self.terminal.as_ref().and_then(|e| e.close_info()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_ready_once() {
        let mut l = Lifecycle::new();
        assert_eq!(l.state, SessionState::Connecting);
        assert!(l.establish());
        assert!(!l.establish());
        assert_eq!(l.state, SessionState::Ready);
        assert!(l.established);
    }

    #[test]
    fn test_lifecycle_first_end_wins() {
        let mut l = Lifecycle::new();
        assert!(l.end(SessionError::ConnectionFailed("refused".into()), false));
        assert!(!l.end(SessionError::ConnectionClosed(CloseInfo::default()), true));
        assert_eq!(l.state, SessionState::Failed);
        assert!(!l.establish());
        assert!(!l.established);
        assert!(l.local_close_info().is_none());
    }

    #[test]
    fn test_local_close_info() {
        let mut l = Lifecycle::new();
        l.establish();
        l.end(SessionError::ConnectionClosed(CloseInfo::new(9, "done")), true);
        assert_eq!(l.state, SessionState::Closed);
        assert!(l.established);
        assert_eq!(l.local_close_info(), Some(CloseInfo::new(9, "done")));

        let mut remote = Lifecycle::new();
        remote.end(SessionError::ConnectionClosed(CloseInfo::new(1, "peer")), false);
        assert!(remote.local_close_info().is_none());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert_eq!(format!("{}", SessionId(0x2a)), "0000002a");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SessionState::Connecting.is_terminal());
        assert!(!SessionState::Ready.is_terminal());
        assert!(SessionState::Closed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert_eq!(SessionState::Ready.to_string(), "ready");
    }
}
