//! Sessions and their datagram handles.
//!
//! A [`Session`] owns one outgoing and one incoming queue for its whole
//! lifetime. The application talks to the queues through [`Datagrams`]
//! ([`DatagramWriter`] / [`DatagramReader`]); the transport talks to them
//! through a [`TransportAdapter`].

mod adapter;
mod session;
mod state;

pub use adapter::TransportAdapter;
pub use session::{DatagramReader, DatagramWriter, Datagrams, Session};
pub use state::{SessionId, SessionState};

use tokio::sync::watch;

use crate::core::{CloseInfo, SessionConfig, SessionError};
use crate::datagram::{IncomingQueue, IncomingStats, OutgoingQueue, OutgoingStats};
use state::Lifecycle;

/// Combined datagram counters of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatagramStats {
    /// Send-side counters.
    pub outgoing: OutgoingStats,
    /// Receive-side counters.
    pub incoming: IncomingStats,
}

/// State shared by the session, its handles and its transport adapter.
#[derive(Debug)]
pub(crate) struct SessionShared {
    id: SessionId,
    remote: String,
    lifecycle: watch::Sender<Lifecycle>,
    outgoing: OutgoingQueue,
    incoming: IncomingQueue,
}

impl SessionShared {
    fn new(remote: String, config: &SessionConfig) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::new());
        Self {
            id: SessionId::next(),
            remote,
            lifecycle,
            outgoing: OutgoingQueue::new(config),
            incoming: IncomingQueue::new(config),
        }
    }

    fn state(&self) -> SessionState {
        self.lifecycle.borrow().state
    }

    fn mark_ready(&self) -> bool {
        let changed = self.lifecycle.send_if_modified(Lifecycle::establish);
        if changed {
            tracing::debug!(session = %self.id, remote = %self.remote, "session ready");
        }
        changed
    }

    /// End the session and release every waiter. Only the first call has an
    /// effect.
    fn terminate(&self, err: SessionError, locally: bool) -> bool {
        let changed = self
            .lifecycle
            .send_if_modified(|l| l.end(err.clone(), locally));
        if !changed {
            return false;
        }

        self.outgoing.terminate(err.clone());
        self.incoming.terminate(err.clone());

        match &err {
            SessionError::ConnectionClosed(info) => {
                tracing::debug!(session = %self.id, locally, %info, "session closed");
            }
            SessionError::ConnectionFailed(reason) => {
                tracing::warn!(session = %self.id, remote = %self.remote, %reason, "session failed");
            }
        }
        true
    }

    async fn ready(&self) -> Result<(), SessionError> {
        let mut rx = self.lifecycle.subscribe();
        let lifecycle = rx
            .wait_for(|l| l.established || l.terminal.is_some())
            .await
            .map_err(|_| SessionError::ConnectionClosed(CloseInfo::default()))?;
        if lifecycle.established {
            return Ok(());
        }
        Err(lifecycle
            .terminal
            .clone()
            .unwrap_or_else(|| SessionError::ConnectionClosed(CloseInfo::default())))
    }

    async fn closed(&self) -> Result<CloseInfo, SessionError> {
        let mut rx = self.lifecycle.subscribe();
        let lifecycle = rx
            .wait_for(|l| l.terminal.is_some())
            .await
            .map_err(|_| SessionError::ConnectionClosed(CloseInfo::default()))?;
        match &lifecycle.terminal {
            Some(SessionError::ConnectionClosed(info)) => Ok(info.clone()),
            Some(err) => Err(err.clone()),
            None => Ok(CloseInfo::default()),
        }
    }

    fn stats(&self) -> DatagramStats {
        DatagramStats {
            outgoing: self.outgoing.stats(),
            incoming: self.incoming.stats(),
        }
    }
}
