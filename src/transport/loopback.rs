//! In-process link for tests and demos.
//!
//! [`LoopbackBuilder::build`] returns two connectors wired to each other.
//! Each direction is a bounded channel; a full channel drops the datagram the
//! way a congested network would. Random loss and a connect delay can be
//! simulated.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::{Connector, DatagramSink, DatagramSource, LinkEvent, TransportError, TransportResult};
use crate::core::{CloseInfo, DEFAULT_LOOPBACK_CAPACITY};
use crate::datagram::Datagram;

/// Builder for a connected pair of loopback connectors.
#[derive(Debug, Clone)]
pub struct LoopbackBuilder {
    capacity: usize,
    loss: f64,
    connect_delay: Duration,
    refuse: Option<String>,
}

impl LoopbackBuilder {
    /// Create a builder with a lossless, instant link.
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_LOOPBACK_CAPACITY,
            loss: 0.0,
            connect_delay: Duration::ZERO,
            refuse: None,
        }
    }

    /// Datagrams in flight per direction before new ones are dropped.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Probability in `[0, 1]` that a sent datagram is lost.
    pub fn loss(mut self, probability: f64) -> Self {
        self.loss = probability.clamp(0.0, 1.0);
        self
    }

    /// Delay before `connect` completes.
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Make both connectors fail to connect with `reason`.
    pub fn refuse(mut self, reason: impl Into<String>) -> Self {
        self.refuse = Some(reason.into());
        self
    }

    /// Build the two ends of the link.
    pub fn build(self) -> (LoopbackConnector, LoopbackConnector) {
        let (a_tx, b_rx) = mpsc::channel(self.capacity);
        let (b_tx, a_rx) = mpsc::channel(self.capacity);
        let end = |name: &str, tx: mpsc::Sender<LinkEvent>, rx: mpsc::Receiver<LinkEvent>| {
            LoopbackConnector {
                name: name.to_string(),
                tx,
                rx,
                loss: self.loss,
                connect_delay: self.connect_delay,
                refuse: self.refuse.clone(),
            }
        };
        (end("loopback-a", a_tx, a_rx), end("loopback-b", b_tx, b_rx))
    }
}

impl Default for LoopbackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A lossless connected pair with default capacity.
pub fn pair() -> (LoopbackConnector, LoopbackConnector) {
    LoopbackBuilder::new().build()
}

/// One end of a loopback link.
#[derive(Debug)]
pub struct LoopbackConnector {
    name: String,
    tx: mpsc::Sender<LinkEvent>,
    rx: mpsc::Receiver<LinkEvent>,
    loss: f64,
    connect_delay: Duration,
    refuse: Option<String>,
}

impl Connector for LoopbackConnector {
    type Sink = LoopbackSink;
    type Source = LoopbackSource;

    fn remote(&self) -> String {
        self.name.clone()
    }

    async fn connect(self) -> TransportResult<(LoopbackSink, LoopbackSource)> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if let Some(reason) = self.refuse {
            return Err(TransportError::Refused(reason));
        }
        Ok((
            LoopbackSink {
                tx: self.tx,
                loss: self.loss,
            },
            LoopbackSource { rx: self.rx },
        ))
    }
}

/// Sending half of a loopback link.
#[derive(Debug)]
pub struct LoopbackSink {
    tx: mpsc::Sender<LinkEvent>,
    loss: f64,
}

impl DatagramSink for LoopbackSink {
    async fn send(&mut self, datagram: Datagram) -> TransportResult<()> {
        if self.loss > 0.0 && rand::random::<f64>() < self.loss {
            tracing::trace!(len = datagram.len(), "loopback: simulated loss");
            return Ok(());
        }
        match self.tx.try_send(LinkEvent::Datagram(datagram)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::trace!("loopback: link full, datagram dropped");
                Ok(())
            }
            // The peer is gone; its end reports the close.
            Err(TrySendError::Closed(_)) => Ok(()),
        }
    }

    async fn close(&mut self, info: CloseInfo) -> TransportResult<()> {
        self.tx
            .send(LinkEvent::Closed(info))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

/// Receiving half of a loopback link.
#[derive(Debug)]
pub struct LoopbackSource {
    rx: mpsc::Receiver<LinkEvent>,
}

impl DatagramSource for LoopbackSource {
    async fn recv(&mut self) -> TransportResult<LinkEvent> {
        Ok(self
            .rx
            .recv()
            .await
            .unwrap_or_else(|| LinkEvent::Closed(CloseInfo::default())))
    }
}
