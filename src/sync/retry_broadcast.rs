//! One-shot completion signal that re-broadcasts for a bounded window.
//!
//! A plain condition variable delivers its broadcast exactly once; a waiter
//! that has not parked yet misses it for good. Short-lived tasks routinely
//! finish before their waiter reaches the wait call, so this primitive
//! re-issues the broadcast every `gap` until all expected receipts arrive or
//! `limit` elapses. Callers must still install their waiter before the event
//! that triggers the broadcast; the window only covers scheduling jitter in
//! between.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Inner {
    pending: Mutex<usize>,
    wake: Condvar,
    gap: Duration,
    limit: Duration,
}

/// Condition-variable wrapper with retrying broadcast. Cheap to clone; all
/// clones share the same signal state.
#[derive(Debug, Clone)]
pub struct RetryBroadcast {
    inner: Arc<Inner>,
}

impl RetryBroadcast {
    /// `gap` is the pause between two broadcast retries, `limit` how long to
    /// keep retrying. Both are microsecond-scale in practice.
    pub fn new(gap: Duration, limit: Duration) -> Self {
        RetryBroadcast {
            inner: Arc::new(Inner {
                pending: Mutex::new(0),
                wake: Condvar::new(),
                gap,
                limit,
            }),
        }
    }

    /// Park until a broadcast arrives, then consume one receipt.
    pub fn wait(&self) {
        let mut pending = self.inner.pending.lock();
        self.inner.wake.wait(&mut pending);
        *pending = pending.saturating_sub(1);
    }

    /// Park until a broadcast arrives or `timeout` elapses. A receipt is
    /// consumed only on a broadcast-triggered wake, never on timeout.
    /// Returns true if a broadcast woke the caller.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut pending = self.inner.pending.lock();
        let result = self.inner.wake.wait_for(&mut pending, timeout);
        if result.timed_out() {
            return false;
        }
        *pending = pending.saturating_sub(1);
        true
    }

    /// Announce completion to `receipts` expected waiters. Fails with
    /// [`Error::BroadcastBusy`] while receipts from an earlier broadcast are
    /// still outstanding.
    pub fn broadcast(&self, receipts: usize) -> Result<()> {
        {
            let mut pending = self.inner.pending.lock();
            if *pending > 0 {
                return Err(Error::BroadcastBusy);
            }
            *pending = receipts;
        }
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || rebroadcast(inner));
        Ok(())
    }

    /// Announce completion to a single waiter.
    pub fn signal(&self) -> Result<()> {
        self.broadcast(1)
    }

    /// Receipts not yet consumed by waiters.
    pub fn pending_receipts(&self) -> usize {
        *self.inner.pending.lock()
    }
}

fn rebroadcast(inner: Arc<Inner>) {
    let started = Instant::now();
    while *inner.pending.lock() > 0 && started.elapsed() < inner.limit {
        inner.wake.notify_all();
        thread::sleep(inner.gap);
    }
    let outstanding = *inner.pending.lock();
    if outstanding > 0 {
        tracing::warn!(
            outstanding,
            "broadcast window expired before all waiters acknowledged"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiters_parked_after_broadcast_still_wake() {
        let signal = RetryBroadcast::new(Duration::from_micros(50), Duration::from_millis(500));

        let mut waiters = Vec::new();
        for _ in 0..2 {
            let signal = signal.clone();
            waiters.push(thread::spawn(move || {
                // park only after the broadcast below has been issued
                thread::sleep(Duration::from_millis(2));
                signal.wait();
            }));
        }

        signal.broadcast(2).unwrap();
        for waiter in waiters {
            waiter.join().unwrap();
        }
        assert_eq!(signal.pending_receipts(), 0);
    }

    #[test]
    fn test_second_broadcast_while_receipts_outstanding_fails() {
        let signal = RetryBroadcast::new(Duration::from_micros(50), Duration::from_millis(20));
        signal.broadcast(2).unwrap();
        assert!(matches!(signal.signal(), Err(Error::BroadcastBusy)));
    }

    #[test]
    fn test_receipt_deficit_expires_within_limit() {
        let signal = RetryBroadcast::new(Duration::from_micros(50), Duration::from_millis(10));
        signal.broadcast(2).unwrap();
        // nobody waits; the helper must give up on its own
        thread::sleep(Duration::from_millis(50));
        assert_eq!(signal.pending_receipts(), 2);
    }

    #[test]
    fn test_wait_for_times_out_without_broadcast() {
        let signal = RetryBroadcast::new(Duration::from_micros(50), Duration::from_millis(10));
        let woke = signal.wait_for(Duration::from_millis(5));
        assert!(!woke);
    }

    #[test]
    fn test_timed_out_wait_consumes_no_receipt() {
        let signal = RetryBroadcast::new(Duration::from_micros(50), Duration::from_millis(10));
        signal.broadcast(2).unwrap();
        // let the broadcast window lapse with both receipts unclaimed
        thread::sleep(Duration::from_millis(30));
        assert!(!signal.wait_for(Duration::from_millis(5)));
        assert_eq!(signal.pending_receipts(), 2);
    }
}
