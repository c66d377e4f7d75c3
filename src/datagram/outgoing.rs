//! Outgoing datagram queue (send path).
//!
//! Submitting and waiting for capacity are two separate operations:
//! [`OutgoingQueue::enqueue`] never blocks and never rejects for
//! back-pressure, while [`OutgoingQueue::proceed`] resolves only while the
//! number of admitted-but-undrained datagrams is below the high-water mark.
//! Producers that want to respect back-pressure await `proceed()` before each
//! `enqueue()`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use super::{lock, Datagram};
use crate::core::{validate_high_water_mark, ConfigError, SessionConfig, SessionError};

/// Send-side counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutgoingStats {
    /// Datagrams admitted by `enqueue`.
    pub enqueued: u64,
    /// Datagrams handed to the transport.
    pub sent: u64,
    /// Datagrams discarded for exceeding the outgoing max age.
    pub expired: u64,
    /// Datagrams discarded for exceeding the max datagram size.
    pub oversized: u64,
    /// Datagrams discarded because the session ended before they were sent.
    pub discarded: u64,
}

#[derive(Debug)]
struct Pending {
    datagram: Datagram,
    enqueued_at: Instant,
}

#[derive(Debug)]
struct OutgoingInner {
    pending: VecDeque<Pending>,
    high_water_mark: usize,
    max_datagram_size: usize,
    max_age: Option<Duration>,
    terminal: Option<SessionError>,
    stats: OutgoingStats,
}

impl OutgoingInner {
    /// Drop expired datagrams from the head of the queue.
    ///
    /// Enqueue times are monotonic, so expired entries are always a prefix.
    fn purge_expired(&mut self, now: Instant) -> usize {
        let Some(max_age) = self.max_age else {
            return 0;
        };
        let mut purged = 0;
        while self
            .pending
            .front()
            .is_some_and(|p| now.duration_since(p.enqueued_at) > max_age)
        {
            self.pending.pop_front();
            purged += 1;
        }
        if purged > 0 {
            self.stats.expired += purged as u64;
            tracing::trace!(purged, "discarded expired outgoing datagrams");
        }
        purged
    }

    /// Pop the next sendable datagram. The flag reports whether capacity was
    /// freed (by the pop or by expiry).
    fn take_next(&mut self, now: Instant) -> (Option<Datagram>, bool) {
        if self.terminal.is_some() {
            return (None, false);
        }
        let purged = self.purge_expired(now);
        let datagram = self.pending.pop_front().map(|p| {
            self.stats.sent += 1;
            p.datagram
        });
        let freed = purged > 0 || datagram.is_some();
        (datagram, freed)
    }

    fn has_capacity(&self) -> bool {
        self.pending.len() < self.high_water_mark
    }
}

/// Buffer of datagrams waiting for the transport.
#[derive(Debug)]
pub struct OutgoingQueue {
    inner: Mutex<OutgoingInner>,
    /// Woken when capacity may have been freed or the queue terminated.
    space: Notify,
    /// Woken when a datagram was enqueued or the queue terminated.
    data: Notify,
}

impl OutgoingQueue {
    /// Create an empty queue using the outgoing settings of `config`.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            inner: Mutex::new(OutgoingInner {
                pending: VecDeque::new(),
                high_water_mark: config.outgoing_high_water_mark.max(1),
                max_datagram_size: config.max_datagram_size,
                max_age: config.outgoing_max_age,
                terminal: None,
                stats: OutgoingStats::default(),
            }),
            space: Notify::new(),
            data: Notify::new(),
        }
    }

    /// Admit a datagram for sending.
    ///
    /// Never blocks. Datagrams larger than the max datagram size are
    /// discarded silently. Fails only once the session is terminal.
    pub fn enqueue(&self, datagram: Datagram) -> Result<(), SessionError> {
        {
            let mut inner = lock(&self.inner);
            if let Some(err) = &inner.terminal {
                return Err(err.clone());
            }
            if datagram.len() > inner.max_datagram_size {
                inner.stats.oversized += 1;
                tracing::trace!(
                    len = datagram.len(),
                    max = inner.max_datagram_size,
                    "discarded oversized datagram"
                );
                return Ok(());
            }
            inner.pending.push_back(Pending {
                datagram,
                enqueued_at: Instant::now(),
            });
            inner.stats.enqueued += 1;
        }
        self.data.notify_waiters();
        Ok(())
    }

    /// Wait until the producer may submit another datagram.
    ///
    /// Resolves immediately while fewer than `high_water_mark` datagrams are
    /// pending; otherwise waits for a drain or a raised mark. Resolves with
    /// the terminal error once the session has ended.
    pub async fn proceed(&self) -> Result<(), SessionError> {
        loop {
            let notified = self.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (outcome, purged) = {
                let mut inner = lock(&self.inner);
                if let Some(err) = &inner.terminal {
                    (Some(Err(err.clone())), 0)
                } else {
                    let purged = inner.purge_expired(Instant::now());
                    let outcome = inner.has_capacity().then_some(Ok(()));
                    (outcome, purged)
                }
            };
            if purged > 0 {
                self.space.notify_waiters();
            }
            if let Some(outcome) = outcome {
                return outcome;
            }

            notified.await;
        }
    }

    /// Check, without waiting, whether `proceed()` would resolve `Ok` now.
    pub fn can_proceed(&self) -> bool {
        let inner = lock(&self.inner);
        inner.terminal.is_none() && inner.has_capacity()
    }

    /// Current high-water mark.
    pub fn high_water_mark(&self) -> usize {
        lock(&self.inner).high_water_mark
    }

    /// Change the high-water mark.
    ///
    /// Raising it above the pending count releases waiting producers at
    /// once. Lowering it never discards queued datagrams.
    pub fn set_high_water_mark(&self, mark: usize) -> Result<(), ConfigError> {
        validate_high_water_mark("outgoing", mark)?;
        let previous = {
            let mut inner = lock(&self.inner);
            std::mem::replace(&mut inner.high_water_mark, mark)
        };
        tracing::debug!(previous, mark, "outgoing high-water mark changed");
        self.space.notify_waiters();
        Ok(())
    }

    /// Largest datagram accepted by `enqueue`.
    pub fn max_datagram_size(&self) -> usize {
        lock(&self.inner).max_datagram_size
    }

    /// Number of datagrams admitted but not yet drained.
    pub fn len(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    /// Check if nothing is waiting to be sent.
    pub fn is_empty(&self) -> bool {
        lock(&self.inner).pending.is_empty()
    }

    /// Send-side counters.
    pub fn stats(&self) -> OutgoingStats {
        lock(&self.inner).stats
    }

    /// Hand the oldest pending datagram to the transport.
    ///
    /// Called when the connection can take one more frame. Returns `None` if
    /// nothing is pending or the session has ended.
    pub fn drain_next(&self) -> Option<Datagram> {
        let (datagram, freed) = lock(&self.inner).take_next(Instant::now());
        if freed {
            self.space.notify_waiters();
        }
        datagram
    }

    /// Wait for the next pending datagram and drain it.
    ///
    /// Returns `None` once the session has ended. Cancel safe: a datagram is
    /// only removed in the poll that returns it.
    pub async fn next_outgoing(&self) -> Option<Datagram> {
        loop {
            let notified = self.data.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (datagram, freed, terminal) = {
                let mut inner = lock(&self.inner);
                let terminal = inner.terminal.is_some();
                let (datagram, freed) = inner.take_next(Instant::now());
                (datagram, freed, terminal)
            };
            if freed {
                self.space.notify_waiters();
            }
            if terminal {
                return None;
            }
            if datagram.is_some() {
                return datagram;
            }

            notified.await;
        }
    }

    /// End the queue. Pending datagrams are discarded without error and
    /// every waiter is released with `err`.
    ///
    /// Returns `false` if the queue had already ended.
    pub(crate) fn terminate(&self, err: SessionError) -> bool {
        {
            let mut inner = lock(&self.inner);
            if inner.terminal.is_some() {
                return false;
            }
            let discarded = inner.pending.len();
            inner.pending.clear();
            inner.stats.discarded += discarded as u64;
            if discarded > 0 {
                tracing::trace!(discarded, "discarded unsent datagrams on session end");
            }
            inner.terminal = Some(err);
        }
        self.space.notify_waiters();
        self.data.notify_waiters();
        true
    }
}
