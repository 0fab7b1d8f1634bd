//! Background workers driving a shared [`TrackRegistry`].
//!
//! - [`Ticker`] predicts every track on a fixed interval and prunes stale
//!   ones.
//! - [`IngestWorker`] drains epochs pushed by producers through a channel.
//!
//! Both stop cooperatively: they check a [`Shutdown`] flag between
//! iterations, never mid-operation.

use crate::{error::Result, registry::TrackRegistry, types::Epoch};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, error, info};

/// How often an idle ingest worker re-checks the shutdown flag.
const INGEST_POLL: Duration = Duration::from_millis(50);

/// Cooperative stop flag shared by workers.
#[derive(Clone, Debug, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Producer side of an [`IngestWorker`]. Clone freely.
pub type EpochSender = Sender<Epoch>;

fn join_worker(name: &str, handle: JoinHandle<u64>) -> u64 {
    match handle.join() {
        Ok(count) => count,
        Err(_) => {
            error!(worker = name, "worker thread panicked");
            0
        }
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Calls [`TrackRegistry::tick`] every `registry.tick_interval` seconds and,
/// if `registry.stale_age` is set, [`TrackRegistry::clear_objects`].
///
/// Intervals where [`TrackRegistry::updates_enabled`] is false are skipped
/// and not counted.
pub struct Ticker {
    handle: Option<JoinHandle<u64>>,
    shutdown: Shutdown,
}

impl Ticker {
    pub fn spawn(registry: Arc<TrackRegistry>, shutdown: Shutdown) -> Result<Self> {
        let interval = registry.config().registry.tick_interval()?;
        let stale_age = registry.config().registry.stale_age;
        let flag = shutdown.clone();

        let handle = thread::Builder::new()
            .name("tracker-ticker".into())
            .spawn(move || {
                let mut ticks = 0u64;
                while !flag.is_triggered() {
                    if registry.updates_enabled() {
                        registry.tick();
                        if let Some(age) = stale_age {
                            registry.clear_objects(age);
                        }
                        ticks += 1;
                    }

                    // No deadline means the interval outlasts the clock: wait for stop.
                    let deadline = Instant::now().checked_add(interval);
                    loop {
                        if flag.is_triggered() {
                            break;
                        }
                        match deadline {
                            Some(deadline) => {
                                let now = Instant::now();
                                if now >= deadline {
                                    break;
                                }
                                thread::park_timeout(deadline - now);
                            }
                            None => thread::park(),
                        }
                    }
                }
                debug!(ticks, "ticker stopped");
                ticks
            })?;

        info!(interval_s = interval.as_secs_f64(), "ticker started");
        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Signal shutdown, wake the thread and wait for it. Returns the tick count.
    pub fn stop(mut self) -> u64 {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> u64 {
        self.shutdown.trigger();
        match self.handle.take() {
            Some(handle) => {
                handle.thread().unpark();
                join_worker("ticker", handle)
            }
            None => 0,
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

// ---------------------------------------------------------------------------
// Ingest worker
// ---------------------------------------------------------------------------

/// Applies epochs received on a channel to the registry, one at a time.
pub struct IngestWorker {
    handle: Option<JoinHandle<u64>>,
    shutdown: Shutdown,
}

impl IngestWorker {
    /// Start the worker; producers push epochs through the returned sender.
    ///
    /// The worker exits when the shutdown flag is set or every sender has
    /// been dropped.
    pub fn spawn(registry: Arc<TrackRegistry>, shutdown: Shutdown) -> Result<(Self, EpochSender)> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let flag = shutdown.clone();
        let handle = thread::Builder::new()
            .name("tracker-ingest".into())
            .spawn(move || Self::run(&registry, &rx, &flag))?;
        Ok((
            Self {
                handle: Some(handle),
                shutdown,
            },
            tx,
        ))
    }

    fn run(registry: &TrackRegistry, rx: &Receiver<Epoch>, shutdown: &Shutdown) -> u64 {
        let mut epochs = 0u64;
        while !shutdown.is_triggered() {
            match rx.recv_timeout(INGEST_POLL) {
                Ok(epoch) => {
                    registry.ingest_epoch(&epoch);
                    epochs += 1;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!(epochs, "ingest worker stopped");
        epochs
    }

    /// Wait for the worker to exit on its own (all senders dropped).
    pub fn join(mut self) -> u64 {
        match self.handle.take() {
            Some(handle) => join_worker("ingest", handle),
            None => 0,
        }
    }

    /// Signal shutdown and wait. Epochs still queued are discarded.
    pub fn stop(mut self) -> u64 {
        self.shutdown.trigger();
        match self.handle.take() {
            Some(handle) => join_worker("ingest", handle),
            None => 0,
        }
    }
}

impl Drop for IngestWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown.trigger();
            join_worker("ingest", handle);
        }
    }
}
