//! Transport-facing side of a session.

use std::sync::Arc;

use super::{DatagramStats, SessionId, SessionShared, SessionState};
use crate::core::{CloseInfo, SessionError};
use crate::datagram::Datagram;

/// Call sites the underlying connection uses to move datagrams in and out of
/// a session and to report connection lifecycle events.
///
/// The adapter implements no framing, encryption or congestion control; it
/// only honors the queue contracts.
#[derive(Debug, Clone)]
pub struct TransportAdapter {
    shared: Arc<SessionShared>,
}

impl TransportAdapter {
    pub(crate) fn new(shared: Arc<SessionShared>) -> Self {
        Self { shared }
    }

    /// Identifier of the session this adapter serves.
    pub fn session_id(&self) -> SessionId {
        self.shared.id
    }

    /// Remote endpoint description of the session.
    pub fn remote(&self) -> &str {
        &self.shared.remote
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Largest datagram the session admits for sending.
    pub fn max_datagram_size(&self) -> usize {
        self.shared.outgoing.max_datagram_size()
    }

    /// Datagram counters of the session.
    pub fn stats(&self) -> DatagramStats {
        self.shared.stats()
    }

    /// Pull the next datagram to transmit, if any.
    ///
    /// Call when the connection has room for one more frame.
    pub fn drain_next(&self) -> Option<Datagram> {
        self.shared.outgoing.drain_next()
    }

    /// Wait for the next datagram to transmit. `None` once the session ends.
    pub async fn next_outgoing(&self) -> Option<Datagram> {
        self.shared.outgoing.next_outgoing().await
    }

    /// Push a datagram received from the wire into the incoming queue.
    ///
    /// Returns `false` if it was dropped.
    pub fn deliver(&self, datagram: Datagram) -> bool {
        self.shared.incoming.on_arrival(datagram)
    }

    /// Report that the connection is established. Returns `false` if the
    /// session was not connecting.
    pub fn connected(&self) -> bool {
        self.shared.mark_ready()
    }

    /// Report that the connection failed. Returns `false` if the session had
    /// already ended.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.shared
            .terminate(SessionError::ConnectionFailed(reason.into()), false)
    }

    /// Report that the peer closed the session.
    pub fn remote_closed(&self, info: CloseInfo) -> bool {
        self.shared
            .terminate(SessionError::ConnectionClosed(info), false)
    }

    /// Close info to send to the peer, if the local application closed the
    /// session.
    pub fn local_close_info(&self) -> Option<CloseInfo> {
        self.shared.lifecycle.borrow().local_close_info()
    }

    /// Check if the session has ended.
    pub fn is_terminated(&self) -> bool {
        self.shared.state().is_terminal()
    }

    /// Wait until the session ends.
    pub async fn terminated(&self) {
        let _ = self.shared.closed().await;
    }
}
