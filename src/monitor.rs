//! Periodic polling of a monitored entity.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Something worth watching. Implementations should keep `data` lightweight;
/// it runs on every poll.
pub trait Monitored: Send + Sync {
    /// Reference name, used to locate samples in the logs.
    fn name(&self) -> &str;

    /// Current health data, by convention a JSON string.
    fn data(&self) -> String;
}

/// Polls a [`Monitored`] entity at a fixed frequency, logs every sample and
/// publishes it on a bounded channel for interested consumers.
pub struct Monitor {
    frequency: Duration,
    running: Arc<AtomicBool>,
    entity: Arc<dyn Monitored>,
    samples_tx: Sender<String>,
    samples_rx: Receiver<String>,
}

impl Monitor {
    /// Build a monitor polling `entity` every `frequency_secs` seconds, with
    /// room for `buffer` unconsumed samples.
    pub fn new(frequency_secs: u64, buffer: usize, entity: Arc<dyn Monitored>) -> Self {
        let (samples_tx, samples_rx) = bounded(buffer);
        Monitor {
            frequency: Duration::from_secs(frequency_secs),
            running: Arc::new(AtomicBool::new(false)),
            entity,
            samples_tx,
            samples_rx,
        }
    }

    /// Start the polling thread. Calling start on a running monitor is a
    /// no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let running = Arc::clone(&self.running);
        let entity = Arc::clone(&self.entity);
        let samples = self.samples_tx.clone();
        let frequency = self.frequency;
        let spawned = thread::Builder::new()
            .name(String::from("taskmill-monitor"))
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    thread::sleep(frequency);
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    let sample = entity.data();
                    tracing::info!(entity = entity.name(), %sample, "monitor sample");
                    if samples.try_send(sample).is_err() {
                        // nobody is draining the channel; drop rather than stall
                        tracing::debug!("monitor channel full, dropping sample");
                    }
                }
                tracing::debug!("monitor stopped");
            });
        if let Err(err) = spawned {
            self.running.store(false, Ordering::Release);
            tracing::error!(error = %err, "failed to spawn monitor");
        }
    }

    /// Stop polling. The thread exits at its next tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Receiving end of the published samples.
    pub fn samples(&self) -> Receiver<String> {
        self.samples_rx.clone()
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("frequency", &self.frequency)
            .field("entity", &self.entity.name())
            .field("running", &self.running.load(Ordering::Acquire))
            .finish()
    }
}
