//! Transport layer: links that carry session datagrams over a connection.
//!
//! A [`Connector`] establishes the underlying connection and yields a
//! [`DatagramSink`] / [`DatagramSource`] pair. The session driver pumps the
//! outgoing queue into the sink and the source into the incoming queue,
//! through the session's [`TransportAdapter`](crate::session::TransportAdapter).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      Session (queues, back-pressure)    │
//! ├─────────────────────────────────────────┤
//! │      Driver (send pump, recv pump)      │  ← This module
//! ├─────────────────────────────────────────┤
//! │  Link: UDP │ capsule stream │ loopback  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Links are feature-gated: `udp`, `capsule` and `loopback`.

mod driver;
mod error;

#[cfg(feature = "capsule")]
#[cfg_attr(docsrs, doc(cfg(feature = "capsule")))]
pub mod capsule;

#[cfg(feature = "capsule")]
#[cfg_attr(docsrs, doc(cfg(feature = "capsule")))]
mod stream;

#[cfg(feature = "loopback")]
#[cfg_attr(docsrs, doc(cfg(feature = "loopback")))]
pub mod loopback;

#[cfg(feature = "udp")]
#[cfg_attr(docsrs, doc(cfg(feature = "udp")))]
mod udp;

use std::future::Future;

pub(crate) use driver::drive;
pub use error::*;

#[cfg(feature = "capsule")]
pub use stream::{CapsuleConnector, CapsuleSink, CapsuleSource};

#[cfg(feature = "loopback")]
pub use loopback::{LoopbackBuilder, LoopbackConnector};

#[cfg(feature = "udp")]
pub use udp::{UdpConnector, UdpSink, UdpSource};

use crate::core::CloseInfo;
use crate::datagram::Datagram;

/// Something received from a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A datagram arrived.
    Datagram(Datagram),
    /// The peer ended the session.
    Closed(CloseInfo),
}

/// Establishes the underlying connection for a session.
pub trait Connector: Send + 'static {
    /// Sending half of the established link.
    type Sink: DatagramSink;
    /// Receiving half of the established link.
    type Source: DatagramSource;

    /// Human-readable remote endpoint, used in logs.
    fn remote(&self) -> String;

    /// Establish the connection.
    fn connect(
        self,
    ) -> impl Future<Output = TransportResult<(Self::Sink, Self::Source)>> + Send;
}

/// Sending half of a link.
pub trait DatagramSink: Send + 'static {
    /// Transmit one datagram. Resolving means the link accepted it, not that
    /// the peer received it.
    fn send(&mut self, datagram: Datagram) -> impl Future<Output = TransportResult<()>> + Send;

    /// Tell the peer the session is over.
    fn close(&mut self, info: CloseInfo) -> impl Future<Output = TransportResult<()>> + Send {
        let _ = info;
        async { Ok(()) }
    }
}

/// Receiving half of a link.
pub trait DatagramSource: Send + 'static {
    /// Wait for the next event. Must be cancel safe: the driver races it
    /// against session termination.
    fn recv(&mut self) -> impl Future<Output = TransportResult<LinkEvent>> + Send;
}
