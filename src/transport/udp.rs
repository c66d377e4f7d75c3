//! Connected UDP socket link.
//!
//! Each datagram maps to exactly one UDP payload. There is no handshake: the
//! link is established once the socket is bound and connected.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use super::{Connector, DatagramSink, DatagramSource, LinkEvent, TransportError, TransportResult};
use crate::core::{DEFAULT_MAX_DATAGRAM_SIZE, DEFAULT_RECV_BUFFER_SIZE};
use crate::datagram::Datagram;

/// Connector for a UDP peer.
#[derive(Debug, Clone)]
pub struct UdpConnector {
    local: SocketAddr,
    remote: SocketAddr,
    recv_buffer_size: usize,
    max_payload_size: usize,
}

impl UdpConnector {
    /// Connect to `remote` from an ephemeral local port.
    pub fn new(remote: SocketAddr) -> Self {
        let local = if remote.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        Self {
            local,
            remote,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            max_payload_size: DEFAULT_MAX_DATAGRAM_SIZE,
        }
    }

    /// Bind to a specific local address.
    pub fn bind(mut self, local: SocketAddr) -> Self {
        self.local = local;
        self
    }

    /// Set the receive buffer size. Never smaller than the max payload size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Set the largest payload sent in one UDP datagram.
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Establish the link on an already bound socket.
    pub async fn from_socket(self, socket: UdpSocket) -> io::Result<(UdpSink, UdpSource)> {
        socket.connect(self.remote).await?;
        let socket = Arc::new(socket);
        let recv_buffer_size = self.recv_buffer_size.max(self.max_payload_size).max(1);
        Ok((
            UdpSink {
                socket: Arc::clone(&socket),
                max_payload_size: self.max_payload_size,
            },
            UdpSource {
                socket,
                recv_buffer: vec![0u8; recv_buffer_size],
            },
        ))
    }
}

impl Connector for UdpConnector {
    type Sink = UdpSink;
    type Source = UdpSource;

    fn remote(&self) -> String {
        self.remote.to_string()
    }

    async fn connect(self) -> TransportResult<(UdpSink, UdpSource)> {
        let socket = UdpSocket::bind(self.local).await?;
        tracing::debug!(local = %socket.local_addr()?, remote = %self.remote, "udp socket bound");
        Ok(self.from_socket(socket).await?)
    }
}

/// Sending half of a UDP link.
#[derive(Debug)]
pub struct UdpSink {
    socket: Arc<UdpSocket>,
    max_payload_size: usize,
}

impl UdpSink {
    /// Local address of the socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramSink for UdpSink {
    async fn send(&mut self, datagram: Datagram) -> TransportResult<()> {
        if datagram.len() > self.max_payload_size {
            return Err(TransportError::DatagramTooLarge {
                size: datagram.len(),
                max: self.max_payload_size,
            });
        }
        self.socket.send(&datagram).await?;
        Ok(())
    }
}

/// Receiving half of a UDP link.
#[derive(Debug)]
pub struct UdpSource {
    socket: Arc<UdpSocket>,
    recv_buffer: Vec<u8>,
}

impl DatagramSource for UdpSource {
    async fn recv(&mut self) -> TransportResult<LinkEvent> {
        let len = self.socket.recv(&mut self.recv_buffer).await?;
        Ok(LinkEvent::Datagram(Datagram::copy_from_slice(
            &self.recv_buffer[..len],
        )))
    }
}
