//! Background delivery of events and weight reports to the sink.
//!
//! The worker thread owns the `EventSink`; the runner only enqueues. A slow
//! or unreachable backend therefore delays delivery, never the next tick.
//! The queue is bounded: when it is full, new items are dropped and counted.
//!
//! Dropping the worker closes the queue and joins the thread after the
//! items already queued have been handed to the sink.
use crossbeam_channel as xch;
use dispenser_traits::{DispenseEvent, EventSink, WeightReport};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::DispenseError;

/// Items waiting for the sink before new ones are dropped.
pub const DELIVERY_QUEUE_DEPTH: usize = 64;

enum Job {
    Event(DispenseEvent),
    Report(WeightReport),
    /// Answered once every job queued before it has been handled.
    Barrier(xch::Sender<()>),
}

#[derive(Debug, Default)]
struct Counters {
    events_recorded: AtomicU64,
    events_failed: AtomicU64,
    reports_sent: AtomicU64,
    reports_failed: AtomicU64,
}

/// Snapshot of what the worker has handed to the sink so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStats {
    pub events_recorded: u64,
    pub events_failed: u64,
    pub reports_sent: u64,
    pub reports_failed: u64,
    /// Events and reports discarded because the queue was full.
    pub dropped: u64,
}

pub struct SinkWorker {
    tx: Option<xch::Sender<Job>>,
    counters: Arc<Counters>,
    dropped: u64,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl SinkWorker {
    pub fn spawn<K: EventSink + Send + 'static>(mut sink: K) -> Self {
        let (tx, rx) = xch::bounded::<Job>(DELIVERY_QUEUE_DEPTH);
        let counters = Arc::new(Counters::default());
        let thread_counters = counters.clone();

        let join_handle = std::thread::spawn(move || {
            // Ends once the runner side is dropped and the queue is empty.
            for job in rx {
                match job {
                    Job::Event(event) => match sink.record(&event) {
                        Ok(()) => {
                            thread_counters.events_recorded.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(action = %event.action, weight = event.weight, "event recorded");
                        }
                        Err(e) => {
                            thread_counters.events_failed.fetch_add(1, Ordering::Relaxed);
                            let err = DispenseError::Transport(e.to_string());
                            tracing::warn!(action = %event.action, error = %err, "event dropped");
                        }
                    },
                    Job::Report(report) => match sink.report_weight(&report) {
                        Ok(()) => {
                            thread_counters.reports_sent.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(weight = report.weight, "weight reported");
                        }
                        Err(e) => {
                            thread_counters.reports_failed.fetch_add(1, Ordering::Relaxed);
                            let err = DispenseError::Transport(e.to_string());
                            tracing::warn!(error = %err, "weight report dropped");
                        }
                    },
                    Job::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::trace!("sink worker exiting cleanly");
        });

        Self {
            tx: Some(tx),
            counters,
            dropped: 0,
            join_handle: Some(join_handle),
        }
    }

    /// Queue an event without waiting. Returns false if it was dropped.
    pub fn send_event(&mut self, event: DispenseEvent) -> bool {
        self.enqueue(Job::Event(event))
    }

    /// Queue a weight report without waiting. Returns false if it was dropped.
    pub fn send_report(&mut self, report: WeightReport) -> bool {
        self.enqueue(Job::Report(report))
    }

    fn enqueue(&mut self, job: Job) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(job) {
            Ok(()) => true,
            Err(xch::TrySendError::Full(job)) => {
                self.dropped += 1;
                match job {
                    Job::Event(event) => {
                        tracing::warn!(action = %event.action, "delivery queue full; event dropped");
                    }
                    Job::Report(_) => tracing::debug!("delivery queue full; weight report dropped"),
                    Job::Barrier(_) => {}
                }
                false
            }
            Err(xch::TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                tracing::error!("sink worker is gone; delivery dropped");
                false
            }
        }
    }

    /// Block up to `timeout` until everything queued so far has reached the
    /// sink. Returns false on timeout.
    pub fn settle(&self, timeout: Duration) -> bool {
        let Some(tx) = &self.tx else {
            return true;
        };
        let (done_tx, done_rx) = xch::bounded(1);
        if tx.send_timeout(Job::Barrier(done_tx), timeout).is_err() {
            return false;
        }
        done_rx.recv_timeout(timeout).is_ok()
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            events_recorded: self.counters.events_recorded.load(Ordering::Relaxed),
            events_failed: self.counters.events_failed.load(Ordering::Relaxed),
            reports_sent: self.counters.reports_sent.load(Ordering::Relaxed),
            reports_failed: self.counters.reports_failed.load(Ordering::Relaxed),
            dropped: self.dropped,
        }
    }
}

impl Drop for SinkWorker {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sink worker joined"),
                Err(e) => tracing::warn!(?e, "sink worker panicked during shutdown"),
            }
        }
    }
}
