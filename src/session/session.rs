//! Application-facing session API.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::Instrument;

use super::{DatagramStats, SessionId, SessionShared, SessionState, TransportAdapter};
use crate::core::{CloseInfo, ConfigError, SessionConfig, SessionError};
use crate::datagram::Datagram;
use crate::transport::{drive, Connector};

/// One logical connection carrying an unreliable datagram channel.
///
/// Datagrams can be written and read as soon as the session exists; writes
/// made while still [`SessionState::Connecting`] are buffered until the
/// connection is up.
///
/// Dropping the session closes it.
///
/// # Example
///
/// ```ignore
/// use webtransport_datagrams::prelude::*;
///
/// let session = Session::open(UdpConnector::new(remote), SessionConfig::default())?;
/// let datagrams = session.datagrams();
/// let writer = datagrams.writer();
///
/// // No need to wait for the handshake before filling the queue.
/// writer.ready().await?;
/// writer.write("hello")?;
///
/// session.ready().await?;
/// let echoed = datagrams.reader().read().await?;
/// ```
#[derive(Debug)]
pub struct Session {
    shared: Arc<SessionShared>,
    driver: Option<JoinHandle<()>>,
}

impl Session {
    /// Start connecting through `connector` and return immediately.
    ///
    /// Must be called from within a Tokio runtime: the connection is driven
    /// by a spawned task.
    pub fn open<C: Connector>(connector: C, config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let shared = Arc::new(SessionShared::new(connector.remote(), &config));
        let adapter = TransportAdapter::new(Arc::clone(&shared));

        let span = tracing::debug_span!("session", id = %shared.id, remote = %shared.remote);
        let driver = tokio::spawn(drive(connector, adapter).instrument(span));
        tracing::debug!(session = %shared.id, remote = %shared.remote, "session opened");

        Ok(Self {
            shared,
            driver: Some(driver),
        })
    }

    /// Create a session whose transport side is driven by the caller.
    ///
    /// The returned adapter is the only way datagrams leave or enter the
    /// session, and the only way it becomes ready.
    pub fn detached(config: SessionConfig) -> Result<(Self, TransportAdapter), ConfigError> {
        config.validate()?;
        let shared = Arc::new(SessionShared::new("detached".to_string(), &config));
        let adapter = TransportAdapter::new(Arc::clone(&shared));
        Ok((
            Self {
                shared,
                driver: None,
            },
            adapter,
        ))
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Remote endpoint description.
    pub fn remote(&self) -> &str {
        &self.shared.remote
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Wait until the connection is established.
    ///
    /// Resolves once: `Ok` when the session became ready (even if it has
    /// closed since), otherwise the error that ended it first.
    pub async fn ready(&self) -> Result<(), SessionError> {
        self.shared.ready().await
    }

    /// Wait until the session ends. Resolves with the close info on a
    /// graceful close and with the error on failure.
    pub async fn closed(&self) -> Result<CloseInfo, SessionError> {
        self.shared.closed().await
    }

    /// Datagram handles of this session.
    pub fn datagrams(&self) -> Datagrams {
        Datagrams {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Datagram counters.
    pub fn stats(&self) -> DatagramStats {
        self.shared.stats()
    }

    /// Close the session without an error code.
    pub fn close(&self) {
        self.close_with(CloseInfo::default());
    }

    /// Close the session, reporting `info` to the peer.
    ///
    /// Unsent datagrams are discarded and every suspended caller is released.
    /// Closing an already ended session does nothing. A reason longer than
    /// the wire limit is truncated.
    pub fn close_with(&self, info: CloseInfo) {
        self.shared
            .terminate(SessionError::ConnectionClosed(info.truncated()), true);
    }

    /// Close the session and wait for the transport to wind down.
    pub async fn shutdown(mut self, info: CloseInfo) {
        self.close_with(info);
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                tracing::warn!(session = %self.shared.id, error = %e, "session driver panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Datagram side of a session: handles plus queue configuration.
#[derive(Debug, Clone)]
pub struct Datagrams {
    shared: Arc<SessionShared>,
}

impl Datagrams {
    /// Handle for sending datagrams.
    pub fn writer(&self) -> DatagramWriter {
        DatagramWriter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Handle for receiving datagrams.
    pub fn reader(&self) -> DatagramReader {
        DatagramReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Largest datagram payload that will be sent.
    pub fn max_datagram_size(&self) -> usize {
        self.shared.outgoing.max_datagram_size()
    }

    /// Current outgoing high-water mark.
    pub fn outgoing_high_water_mark(&self) -> usize {
        self.shared.outgoing.high_water_mark()
    }

    /// Change the outgoing high-water mark.
    pub fn set_outgoing_high_water_mark(&self, mark: usize) -> Result<(), ConfigError> {
        self.shared.outgoing.set_high_water_mark(mark)
    }

    /// Current incoming high-water mark.
    pub fn incoming_high_water_mark(&self) -> usize {
        self.shared.incoming.high_water_mark()
    }

    /// Change the incoming high-water mark.
    pub fn set_incoming_high_water_mark(&self, mark: usize) -> Result<(), ConfigError> {
        self.shared.incoming.set_high_water_mark(mark)
    }
}

/// Sending half of a session's datagram channel.
#[derive(Debug, Clone)]
pub struct DatagramWriter {
    shared: Arc<SessionShared>,
}

impl DatagramWriter {
    /// Queue a datagram for sending. Never waits for capacity.
    ///
    /// Fails only once the session has ended. Payloads above the max
    /// datagram size are discarded silently.
    pub fn write(&self, datagram: impl Into<Datagram>) -> Result<(), SessionError> {
        self.shared.outgoing.enqueue(datagram.into())
    }

    /// Wait until the outgoing queue is below its high-water mark.
    pub async fn ready(&self) -> Result<(), SessionError> {
        self.shared.outgoing.proceed().await
    }

    /// Check, without waiting, whether [`ready`](Self::ready) would resolve
    /// `Ok` now.
    pub fn is_ready(&self) -> bool {
        self.shared.outgoing.can_proceed()
    }

    /// Number of datagrams waiting to be sent.
    pub fn pending(&self) -> usize {
        self.shared.outgoing.len()
    }
}

/// Receiving half of a session's datagram channel.
#[derive(Debug, Clone)]
pub struct DatagramReader {
    shared: Arc<SessionShared>,
}

impl DatagramReader {
    /// Read the next datagram. `Ok(None)` means the session closed and
    /// nothing is left to read.
    pub async fn read(&self) -> Result<Option<Datagram>, SessionError> {
        self.shared.incoming.read().await
    }

    /// Take a datagram if one is already queued.
    pub fn try_read(&self) -> Option<Datagram> {
        self.shared.incoming.try_read()
    }

    /// Number of datagrams waiting to be read.
    pub fn available(&self) -> usize {
        self.shared.incoming.len()
    }
}
