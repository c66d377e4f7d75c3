//! Datagram queues.
//!
//! Each session owns one [`OutgoingQueue`] and one [`IncomingQueue`]. Both
//! are plain bookkeeping plus explicit wakeups: the queues never poll, and
//! their mutexes are never held across an `.await`.
//!
//! ```text
//!  application                         transport
//!  ───────────                         ─────────
//!  write() ──► OutgoingQueue ──► drain_next()
//!  proceed() ◄─┘  (high-water mark)
//!
//!  read() ◄─── IncomingQueue ◄── on_arrival()
//!                 (high-water mark, drop on overflow)
//! ```

mod incoming;
mod outgoing;

use std::fmt;
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

pub use incoming::{IncomingQueue, IncomingStats};
pub use outgoing::{OutgoingQueue, OutgoingStats};

/// An unreliable, immutable message unit.
///
/// Cloning is cheap: the payload is reference counted.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Datagram(Bytes);

impl Datagram {
    /// Create a datagram from any byte buffer.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self(payload.into())
    }

    /// Create a datagram by copying a slice.
    pub fn copy_from_slice(payload: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(payload))
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Payload as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take the underlying buffer.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Datagram {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Datagram {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for Datagram {
    fn from(payload: Bytes) -> Self {
        Self(payload)
    }
}

impl From<Vec<u8>> for Datagram {
    fn from(payload: Vec<u8>) -> Self {
        Self(Bytes::from(payload))
    }
}

impl From<&'static [u8]> for Datagram {
    fn from(payload: &'static [u8]) -> Self {
        Self(Bytes::from_static(payload))
    }
}

impl From<&'static str> for Datagram {
    fn from(payload: &'static str) -> Self {
        Self(Bytes::from_static(payload.as_bytes()))
    }
}

impl From<String> for Datagram {
    fn from(payload: String) -> Self {
        Self(Bytes::from(payload))
    }
}

impl From<Datagram> for Bytes {
    fn from(datagram: Datagram) -> Bytes {
        datagram.0
    }
}

impl fmt::Debug for Datagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Datagram").field(&self.0).finish()
    }
}

/// Lock a queue mutex, recovering the data if a holder panicked.
///
/// Queue bookkeeping stays consistent across a panic because every mutation
/// completes before the guard is released.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
