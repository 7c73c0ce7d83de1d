//! Fixed set of bounded response conduits and their arbitration.
//!
//! Results for many in-flight tasks come back over a small fixed number of
//! bounded channels. The arbiter hands each new task a conduit slot and keeps
//! a per-conduit count of tasks waiting on it; a conduit is full once that
//! count reaches the buffer capacity. The count is deliberately not the
//! channel length: a conduit with an empty buffer can still have capacity
//! many publishers about to block on it.
//!
//! The advertised cursor always points at the emptiest conduit found on the
//! last scan, which keeps publishers from stalling behind one another's full
//! buffers.

use crate::config::DispatcherSettings;
use crate::dispatch::waiters::WaiterRegistry;
use crate::error::{Error, Result};
use crate::executor::task::{Response, ResponseReceiver, ResponseSender};
use crossbeam_channel::bounded;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug)]
struct ConduitState {
    /// Sending halves, cloned into each reserving task; cleared on stop
    senders: Vec<ResponseSender>,
    /// Tasks currently assigned to each conduit
    waiting_on: Vec<usize>,
    /// Conduit advertised to the next reservation; `None` when all are full
    first_available: Option<usize>,
}

/// The response conduit set: N bounded channels, an in-flight counter per
/// channel, and one reader thread per channel delivering results to the
/// waiter registry.
pub struct ResponseConduits {
    capacity: usize,
    wait_for_avail: bool,
    receivers: Vec<ResponseReceiver>,
    state: Mutex<ConduitState>,
    available: Condvar,
    running: Arc<AtomicBool>,
    readers: Mutex<Vec<JoinHandle<()>>>,
    waiters: Arc<WaiterRegistry>,
}

impl ResponseConduits {
    /// Build the conduit set. Readers stay idle until [`ResponseConduits::start`].
    pub fn new(cfg: &DispatcherSettings, waiters: Arc<WaiterRegistry>) -> Self {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..cfg.channel_count)
            .map(|_| bounded::<Response>(cfg.channel_capacity))
            .unzip();
        let first_available = if cfg.channel_count > 0 { Some(0) } else { None };
        ResponseConduits {
            capacity: cfg.channel_capacity,
            wait_for_avail: cfg.wait_for_chan_avail,
            receivers,
            state: Mutex::new(ConduitState {
                senders,
                waiting_on: vec![0; cfg.channel_count],
                first_available,
            }),
            available: Condvar::new(),
            running: Arc::new(AtomicBool::new(false)),
            readers: Mutex::new(Vec::new()),
            waiters,
        }
    }

    /// Reserve a conduit slot for one task.
    ///
    /// Returns the conduit index and its sending half, or `None` when every
    /// conduit is at capacity and the set is not configured to wait (or the
    /// set has been stopped).
    pub fn reserve(&self) -> Option<(usize, ResponseSender)> {
        let mut state = self.state.lock();
        if state.first_available.is_none() && !self.wait_for_avail {
            return None;
        }
        let index = loop {
            if state.senders.is_empty() {
                // stopped while we were waiting
                return None;
            }
            match state.first_available {
                Some(index) => break index,
                None => self.available.wait(&mut state),
            }
        };

        state.waiting_on[index] += 1;
        state.first_available = next_available(&state.waiting_on, index, self.capacity);
        let sender = state.senders[index].clone();
        Some((index, sender))
    }

    /// Return the slot a task held on conduit `index`.
    pub fn release(&self, index: usize) {
        let mut state = self.state.lock();
        if index >= state.waiting_on.len() {
            tracing::warn!(conduit = index, "release for a conduit that does not exist");
            return;
        }
        if state.waiting_on[index] > 0 {
            state.waiting_on[index] -= 1;
        } else {
            // points at a bookkeeping bug somewhere upstream
            tracing::warn!(
                conduit = index,
                "releasing a conduit slot that is already free"
            );
        }
        if state.first_available.is_none() {
            state.first_available = Some(index);
        }
        drop(state);
        self.available.notify_one();
    }

    /// Spawn one reader per conduit. Each reader takes results off its
    /// channel and hands them to the waiter registry.
    pub fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::Release);
        let mut readers = self.readers.lock();
        for (index, receiver) in self.receivers.iter().enumerate() {
            let receiver = receiver.clone();
            let running = Arc::clone(&self.running);
            let waiters = Arc::clone(&self.waiters);
            let reader = thread::Builder::new()
                .name(format!("taskmill-conduit-{}", index))
                .spawn(move || read_loop(receiver, running, waiters))
                .map_err(|e| Error::service(format!("spawn of conduit reader failed: {}", e)))?;
            readers.push(reader);
        }
        Ok(())
    }

    /// Close the conduits and join the readers. Results already buffered are
    /// dropped; publishers still holding a sending half are unaffected until
    /// they drop it.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.state.lock().senders.clear();
        // wake any reservation blocked on the condvar so it can observe the close
        self.available.notify_all();
        let readers: Vec<_> = self.readers.lock().drain(..).collect();
        for reader in readers {
            let _ = reader.join();
        }
    }

    /// Sum of tasks currently assigned across all conduits.
    pub fn total_waiting(&self) -> usize {
        self.state.lock().waiting_on.iter().sum()
    }
}

impl std::fmt::Debug for ResponseConduits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResponseConduits")
            .field("capacity", &self.capacity)
            .field("wait_for_avail", &self.wait_for_avail)
            .field("waiting_on", &state.waiting_on)
            .field("first_available", &state.first_available)
            .finish()
    }
}

/// Pick the conduit to advertise after a reservation on `start`.
///
/// Scans forward from `start + 1`, wrapping around and considering `start`
/// itself last (with its freshly incremented count). An idle conduit wins
/// outright; otherwise the least-loaded conduit still below capacity is
/// chosen. `None` means every conduit is at capacity.
fn next_available(waiting_on: &[usize], start: usize, capacity: usize) -> Option<usize> {
    let count = waiting_on.len();
    let mut min_index = None;
    let mut min_seen = capacity;
    for step in 1..=count {
        let index = (start + step) % count;
        let waiting = waiting_on[index];
        if waiting == 0 {
            return Some(index);
        }
        if waiting < min_seen {
            min_seen = waiting;
            min_index = Some(index);
        }
    }
    min_index
}

fn read_loop(receiver: ResponseReceiver, running: Arc<AtomicBool>, waiters: Arc<WaiterRegistry>) {
    while running.load(Ordering::Acquire) {
        let response = match receiver.recv() {
            Ok(response) => response,
            // all senders gone, the conduit is closed
            Err(_) => break,
        };
        let task_id = response.task_id;
        match waiters.deliver(response) {
            Some(entry) => {
                // the housekeeper always listens; a blocking submitter makes two
                let receipts = if entry.blocking() { 2 } else { 1 };
                if let Err(err) = entry.signal.broadcast(receipts) {
                    tracing::warn!(task_id, error = %err, "could not signal waiter");
                }
            }
            None => {
                tracing::warn!(task_id, "result delivered for an unknown task, dropping");
            }
        }
    }
    tracing::debug!("conduit reader exiting");
}
