//! Incoming datagram queue (receive path).
//!
//! Arrivals beyond the high-water mark are dropped without error: the
//! channel is unreliable and loss is only observable through absence (and the
//! local counters).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use super::{lock, Datagram};
use crate::core::{validate_high_water_mark, ConfigError, SessionConfig, SessionError};

/// Receive-side counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncomingStats {
    /// Datagrams accepted into the queue.
    pub received: u64,
    /// Datagrams dropped because the queue was at its high-water mark.
    pub dropped_full: u64,
    /// Datagrams discarded for exceeding the incoming max age.
    pub expired: u64,
    /// Datagrams handed to the application.
    pub read: u64,
}

#[derive(Debug)]
struct Arrived {
    datagram: Datagram,
    arrived_at: Instant,
}

#[derive(Debug)]
struct IncomingInner {
    queue: VecDeque<Arrived>,
    high_water_mark: usize,
    max_age: Option<Duration>,
    terminal: Option<SessionError>,
    stats: IncomingStats,
}

impl IncomingInner {
    fn purge_expired(&mut self, now: Instant) {
        let Some(max_age) = self.max_age else {
            return;
        };
        let before = self.queue.len();
        while self
            .queue
            .front()
            .is_some_and(|a| now.duration_since(a.arrived_at) > max_age)
        {
            self.queue.pop_front();
        }
        let purged = before - self.queue.len();
        if purged > 0 {
            self.stats.expired += purged as u64;
            tracing::trace!(purged, "discarded expired incoming datagrams");
        }
    }

    fn pop(&mut self, now: Instant) -> Option<Datagram> {
        self.purge_expired(now);
        let datagram = self.queue.pop_front()?.datagram;
        self.stats.read += 1;
        Some(datagram)
    }
}

/// Buffer of received datagrams waiting for the application.
#[derive(Debug)]
pub struct IncomingQueue {
    inner: Mutex<IncomingInner>,
    /// Woken on arrival or termination.
    available: Notify,
}

impl IncomingQueue {
    /// Create an empty queue using the incoming settings of `config`.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            inner: Mutex::new(IncomingInner {
                queue: VecDeque::new(),
                high_water_mark: config.incoming_high_water_mark.max(1),
                max_age: config.incoming_max_age,
                terminal: None,
                stats: IncomingStats::default(),
            }),
            available: Notify::new(),
        }
    }

    /// Accept a datagram from the transport.
    ///
    /// Returns `false` if it was dropped, either because the queue is at its
    /// high-water mark or because the session has ended.
    pub fn on_arrival(&self, datagram: Datagram) -> bool {
        {
            let mut inner = lock(&self.inner);
            if inner.terminal.is_some() {
                return false;
            }
            let now = Instant::now();
            inner.purge_expired(now);
            if inner.queue.len() >= inner.high_water_mark {
                inner.stats.dropped_full += 1;
                tracing::trace!(
                    held = inner.queue.len(),
                    mark = inner.high_water_mark,
                    "dropped incoming datagram at high-water mark"
                );
                return false;
            }
            inner.queue.push_back(Arrived {
                datagram,
                arrived_at: now,
            });
            inner.stats.received += 1;
        }
        self.available.notify_waiters();
        true
    }

    /// Read the oldest queued datagram, waiting for one if necessary.
    ///
    /// Queued datagrams are still returned after the session ends. Once the
    /// queue is empty, a closed session yields `Ok(None)` and a failed one
    /// yields its error.
    pub async fn read(&self) -> Result<Option<Datagram>, SessionError> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = lock(&self.inner);
                if let Some(datagram) = inner.pop(Instant::now()) {
                    return Ok(Some(datagram));
                }
                match &inner.terminal {
                    Some(SessionError::ConnectionClosed(_)) => return Ok(None),
                    Some(err) => return Err(err.clone()),
                    None => {}
                }
            }

            notified.await;
        }
    }

    /// Take the oldest queued datagram without waiting.
    pub fn try_read(&self) -> Option<Datagram> {
        lock(&self.inner).pop(Instant::now())
    }

    /// Current high-water mark.
    pub fn high_water_mark(&self) -> usize {
        lock(&self.inner).high_water_mark
    }

    /// Change the high-water mark for future arrivals.
    ///
    /// Already queued datagrams are kept even if they exceed the new mark.
    pub fn set_high_water_mark(&self, mark: usize) -> Result<(), ConfigError> {
        validate_high_water_mark("incoming", mark)?;
        let previous = {
            let mut inner = lock(&self.inner);
            std::mem::replace(&mut inner.high_water_mark, mark)
        };
        tracing::debug!(previous, mark, "incoming high-water mark changed");
        Ok(())
    }

    /// Number of datagrams waiting to be read.
    pub fn len(&self) -> usize {
        lock(&self.inner).queue.len()
    }

    /// Check if nothing is waiting to be read.
    pub fn is_empty(&self) -> bool {
        lock(&self.inner).queue.is_empty()
    }

    /// Check if the session ended and every queued datagram was read.
    pub fn is_finished(&self) -> bool {
        let inner = lock(&self.inner);
        inner.terminal.is_some() && inner.queue.is_empty()
    }

    /// Receive-side counters.
    pub fn stats(&self) -> IncomingStats {
        lock(&self.inner).stats
    }

    /// End the queue: no further arrivals are accepted and waiting readers
    /// are released. Returns `false` if the queue had already ended.
    pub(crate) fn terminate(&self, err: SessionError) -> bool {
        {
            let mut inner = lock(&self.inner);
            if inner.terminal.is_some() {
                return false;
            }
            inner.terminal = Some(err);
        }
        self.available.notify_waiters();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CloseInfo, SessionConfigBuilder};
    use std::sync::Arc;

    fn queue(mark: usize) -> IncomingQueue {
        let config = SessionConfigBuilder::new()
            .incoming_high_water_mark(mark)
            .build()
            .unwrap();
        IncomingQueue::new(&config)
    }

    #[test]
    fn test_burst_beyond_mark_is_dropped() {
        let q = queue(5);
        let accepted = (0..50)
            .filter(|i| q.on_arrival(Datagram::from(i.to_string())))
            .count();
        assert_eq!(accepted, 5);

        let mut readable = 0;
        while q.try_read().is_some() {
            readable += 1;
        }
        assert_eq!(readable, 5);
        assert_eq!(q.stats().dropped_full, 45);
        assert_eq!(q.stats().read, 5);
    }

    #[test]
    fn test_reads_are_fifo() {
        let q = queue(8);
        for token in ["1", "2", "3"] {
            q.on_arrival(Datagram::from(token));
        }
        assert_eq!(q.try_read(), Some(Datagram::from("1")));
        assert_eq!(q.try_read(), Some(Datagram::from("2")));
        assert_eq!(q.try_read(), Some(Datagram::from("3")));
        assert_eq!(q.try_read(), None);
    }

    #[test]
    fn test_lower_mark_does_not_evict() {
        let q = queue(4);
        for i in 0..4 {
            assert!(q.on_arrival(Datagram::from(i.to_string())));
        }
        q.set_high_water_mark(2).unwrap();
        assert_eq!(q.len(), 4);
        assert!(!q.on_arrival(Datagram::from("late")));

        q.try_read();
        q.try_read();
        q.try_read();
        assert!(q.on_arrival(Datagram::from("fits")));
    }

    #[tokio::test]
    async fn test_arrival_wakes_reader() {
        let q = Arc::new(queue(4));
        let reader = tokio::spawn({
            let q = Arc::clone(&q);
            async move { q.read().await }
        });
        tokio::task::yield_now().await;
        assert!(!reader.is_finished());

        q.on_arrival(Datagram::from("hello"));
        assert_eq!(reader.await.unwrap(), Ok(Some(Datagram::from("hello"))));
    }

    #[tokio::test]
    async fn test_close_ends_reads_after_queued_data() {
        let q = Arc::new(queue(4));
        q.on_arrival(Datagram::from("last"));
        q.terminate(SessionError::ConnectionClosed(CloseInfo::default()));

        assert!(!q.on_arrival(Datagram::from("after")));
        assert!(!q.is_finished());
        assert_eq!(q.read().await, Ok(Some(Datagram::from("last"))));
        assert_eq!(q.read().await, Ok(None));
        assert!(q.is_finished());
    }

    #[tokio::test]
    async fn test_failure_releases_waiting_reader() {
        let q = Arc::new(queue(4));
        let reader = tokio::spawn({
            let q = Arc::clone(&q);
            async move { q.read().await }
        });
        tokio::task::yield_now().await;

        let err = SessionError::ConnectionFailed("reset".into());
        assert!(q.terminate(err.clone()));
        assert!(!q.terminate(SessionError::ConnectionClosed(CloseInfo::default())));
        assert_eq!(reader.await.unwrap(), Err(err.clone()));
        assert_eq!(q.read().await, Err(err));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_datagrams_are_not_read() {
        let config = SessionConfigBuilder::new()
            .incoming_high_water_mark(2)
            .incoming_max_age(Duration::from_millis(50))
            .build()
            .unwrap();
        let q = IncomingQueue::new(&config);

        q.on_arrival(Datagram::from("a"));
        q.on_arrival(Datagram::from("b"));
        tokio::time::advance(Duration::from_millis(60)).await;

        // Expired datagrams no longer count against the mark.
        assert!(q.on_arrival(Datagram::from("c")));
        assert_eq!(q.try_read(), Some(Datagram::from("c")));
        assert_eq!(q.stats().expired, 2);
    }
}
