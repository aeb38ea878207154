//! Background load-cell sampling.
//!
//! Spawns a thread that owns the `LoadCellAdapter`, publishes the latest
//! mass through a bounded channel and tracks the last-ok timestamp so the
//! runner can tell a stalled sensor from a quiet one.
//!
//! Each `Sampler` owns exactly one thread, stopped and joined on drop.
use crossbeam_channel as xch;
use dispenser_traits::{Clock, Scale};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::sensor::LoadCellAdapter;

pub struct Sampler {
    rx: xch::Receiver<f32>,
    last_ok: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
    epoch: Instant,
    clock: Arc<dyn Clock + Send + Sync>,
    /// Dropping this wakes the thread and makes it exit.
    stop_tx: Option<xch::Sender<()>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Sampler {
    pub fn spawn<S: Scale + Send + 'static>(
        mut adapter: LoadCellAdapter<S>,
        period: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let (tx, rx) = xch::bounded(1);
        // Second receiver lets the thread replace an unconsumed sample.
        let stale_rx = rx.clone();
        let (stop_tx, stop_rx) = xch::bounded::<()>(0);
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_thread = last_ok.clone();
        let failures = Arc::new(AtomicU64::new(0));
        let failures_thread = failures.clone();
        let epoch = clock.now();
        let thread_clock = clock.clone();

        let join_handle = std::thread::spawn(move || {
            let mut consecutive_failures: u32 = 0;
            loop {
                match adapter.read_mass() {
                    Ok(grams) => {
                        if consecutive_failures > 0 {
                            tracing::info!(after = consecutive_failures, "sensor recovered");
                        }
                        consecutive_failures = 0;
                        let _ = stale_rx.try_recv();
                        if tx.try_send(grams).is_err() {
                            tracing::trace!("sample slot busy; dropping reading");
                        }
                        last_ok_thread.store(thread_clock.ms_since(epoch), Ordering::Relaxed);
                    }
                    Err(e) => {
                        failures_thread.fetch_add(1, Ordering::Relaxed);
                        consecutive_failures = consecutive_failures.saturating_add(1);
                        if consecutive_failures == 1 {
                            tracing::warn!(error = %e, "sampler read failed");
                        } else {
                            tracing::debug!(error = %e, consecutive_failures, "sampler read failed");
                        }
                    }
                }

                match stop_rx.recv_timeout(period) {
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => {
                        tracing::debug!("sampler thread received shutdown signal");
                        break;
                    }
                }
            }
            tracing::trace!("sampler thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            failures,
            epoch,
            clock,
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    /// Newest sample published since the last call, if any.
    pub fn latest(&self) -> Option<f32> {
        self.rx.try_iter().last()
    }

    /// Block up to `timeout` for the next sample.
    pub fn wait_for_sample(&self, timeout: Duration) -> Option<f32> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Milliseconds since the last successful read.
    pub fn stalled_for_ms(&self) -> u64 {
        self.clock
            .ms_since(self.epoch)
            .saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    /// Failed reads since spawn.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        drop(self.stop_tx.take());
        // The thread exits after its current read (bounded by the sensor
        // timeout times the averaging count).
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sampler thread joined"),
                Err(e) => tracing::warn!(?e, "sampler thread panicked during shutdown"),
            }
        }
    }
}
