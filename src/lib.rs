//! # webtransport-datagrams
//!
//! Session datagram engine for WebTransport-style connections.
//!
//! A [`Session`] exposes an unreliable, unordered datagram channel over one
//! logical connection:
//!
//! - **Writable side**: writes never wait; [`DatagramWriter::ready`] resolves
//!   while the outgoing queue is below its high-water mark
//! - **Readable side**: arrivals beyond the incoming high-water mark are
//!   dropped, never buffered without bound
//! - **Early writes**: datagrams written while connecting are sent once the
//!   connection is up
//! - **Lifecycle**: `ready`/`closed` signals, idempotent close, failure
//!   propagated to every suspended caller
//!
//! ## Feature Flags
//!
//! - `udp` (default): connected UDP socket link
//! - `capsule` (default): capsule codec and capsule-over-stream link
//! - `loopback` (default): in-memory link pair with loss simulation
//!
//! ## Modules
//!
//! - [`core`]: constants, configuration and error types (always included)
//! - [`datagram`]: the outgoing and incoming queues
//! - [`session`]: application and transport facing session handles
//! - [`transport`]: links and the driver connecting them to a session
//!
//! ## Example Usage
//!
//! ```rust
//! use webtransport_datagrams::prelude::*;
//!
//! # async fn run() -> Result<(), WtError> {
//! let (client, server) = webtransport_datagrams::transport::loopback::pair();
//! let client = Session::open(client, SessionConfig::default())?;
//! let server = Session::open(server, SessionConfig::default())?;
//!
//! let writer = client.datagrams().writer();
//! writer.ready().await?;
//! writer.write("hello")?;
//!
//! let received = server.datagrams().reader().read().await?;
//! assert_eq!(received, Some(Datagram::from("hello")));
//!
//! client.close_with(CloseInfo::new(0, "done"));
//! assert_eq!(server.closed().await?, CloseInfo::new(0, "done"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Datagram queues
pub mod datagram;

// Session handles
pub mod session;

// Links and driver
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{
        CloseInfo, ConfigError, SessionConfig, SessionConfigBuilder, SessionError, WtError,
    };
    pub use crate::datagram::Datagram;
    pub use crate::session::{
        DatagramReader, DatagramStats, DatagramWriter, Datagrams, Session, SessionId,
        SessionState, TransportAdapter,
    };
    pub use crate::transport::{
        Connector, DatagramSink, DatagramSource, LinkEvent, TransportError, TransportResult,
    };

    #[cfg(feature = "capsule")]
    pub use crate::transport::CapsuleConnector;

    #[cfg(feature = "loopback")]
    pub use crate::transport::{LoopbackBuilder, LoopbackConnector};

    #[cfg(feature = "udp")]
    pub use crate::transport::UdpConnector;
}

// Re-export commonly used items at crate root
pub use core::{CloseInfo, ConfigError, SessionConfig, SessionError, WtError};
pub use datagram::Datagram;
pub use session::{DatagramReader, DatagramWriter, Datagrams, Session, SessionState};
