//! Cyclic runner: sample, poll requests, tick, flush, report.
//!
//! `Dispenser` owns the sensor path, the controller, the sink worker and any
//! request sources. Each step runs on its own `IntervalTimer`; one `cycle()`
//! runs every step that is due and returns. Flush and telemetry only enqueue
//! for the sink worker, so sink latency never reaches the tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dispenser_traits::{Clock, EventSink, Gate, RequestSource, Scale, WeightReport};

use crate::config::ScheduleCfg;
use crate::controller::DispenseController;
use crate::delivery::SinkWorker;
use crate::error::{DispenseError, Result};
use crate::sampler::Sampler;
use crate::schedule::IntervalTimer;
use crate::sensor::LoadCellAdapter;
use crate::status::{StartOutcome, TickOutcome};

/// How weight samples are acquired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SamplingMode {
    /// Read the scale inside `cycle()` when the sample timer is due.
    #[default]
    Direct,
    /// Read on a background thread; `cycle()` takes the latest sample.
    Threaded,
}

enum SampleSource<S: Scale> {
    Direct(LoadCellAdapter<S>),
    Threaded(Sampler),
}

struct RequestSlot {
    name: String,
    source: Box<dyn RequestSource>,
    timer: IntervalTimer,
}

/// Counters accumulated over the runner's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunnerStats {
    pub cycles: u64,
    pub samples: u64,
    pub sensor_misses: u64,
    pub requests_started: u64,
    pub requests_rejected: u64,
    pub request_errors: u64,
    pub events_recorded: u64,
    pub events_failed: u64,
    pub reports_sent: u64,
    pub reports_failed: u64,
    /// Events and reports discarded because the delivery queue was full.
    pub deliveries_dropped: u64,
}

/// How long `run` waits at shutdown for queued deliveries.
pub const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseOutcome {
    Complete,
    TimedOut,
}

/// Result of a one-shot `Dispenser::dispense`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispenseSummary {
    pub outcome: DispenseOutcome,
    pub target_g: f32,
    pub delivered_g: f32,
    pub elapsed_ms: u64,
}

impl DispenseSummary {
    /// Turn a timed-out dispense into `DispenseError::Timeout`.
    pub fn ensure_complete(self) -> Result<Self> {
        match self.outcome {
            DispenseOutcome::Complete => Ok(self),
            DispenseOutcome::TimedOut => Err(eyre::Report::new(DispenseError::Timeout {
                delivered_g: self.delivered_g,
            })),
        }
    }
}

pub struct Dispenser<S: Scale, G: Gate> {
    source: SampleSource<S>,
    controller: DispenseController<G>,
    delivery: SinkWorker,
    requests: Vec<RequestSlot>,
    clock: Arc<dyn Clock + Send + Sync>,
    schedule: ScheduleCfg,
    sample_timer: IntervalTimer,
    tick_timer: IntervalTimer,
    flush_timer: IntervalTimer,
    telemetry_timer: IntervalTimer,
    consecutive_misses: u32,
    stats: RunnerStats,
}

impl<S, G> Dispenser<S, G>
where
    S: Scale + Send + 'static,
    G: Gate,
{
    /// The sink moves to its own delivery thread.
    pub fn new<K: EventSink + Send + 'static>(
        adapter: LoadCellAdapter<S>,
        controller: DispenseController<G>,
        sink: K,
        schedule: ScheduleCfg,
        mode: SamplingMode,
    ) -> Self {
        // Sampling and ticking must run for a session to ever end.
        let schedule = ScheduleCfg {
            sample_ms: schedule.sample_ms.max(1),
            tick_ms: schedule.tick_ms.max(1),
            ..schedule
        };
        let clock = controller.clock().clone();
        let source = match mode {
            SamplingMode::Direct => SampleSource::Direct(adapter),
            SamplingMode::Threaded => SampleSource::Threaded(Sampler::spawn(
                adapter,
                Duration::from_millis(schedule.sample_ms),
                clock.clone(),
            )),
        };
        tracing::debug!(?mode, ?schedule, "runner configured");
        Self {
            source,
            controller,
            delivery: SinkWorker::spawn(sink),
            requests: Vec::new(),
            clock,
            schedule,
            sample_timer: IntervalTimer::from_ms(schedule.sample_ms),
            tick_timer: IntervalTimer::from_ms(schedule.tick_ms),
            flush_timer: IntervalTimer::from_ms(schedule.flush_ms),
            telemetry_timer: IntervalTimer::from_ms(schedule.telemetry_ms),
            consecutive_misses: 0,
            stats: RunnerStats::default(),
        }
    }

    /// Register a request source polled every `poll_ms` while idle.
    /// Sources are polled in registration order.
    pub fn add_request_source(
        &mut self,
        name: impl Into<String>,
        source: impl RequestSource + 'static,
        poll_ms: u64,
    ) {
        let name = name.into();
        if poll_ms == 0 {
            tracing::debug!(source = %name, "request source disabled (poll_ms = 0)");
        }
        self.requests.push(RequestSlot {
            name,
            source: Box::new(source),
            timer: IntervalTimer::from_ms(poll_ms),
        });
    }

    pub fn controller(&self) -> &DispenseController<G> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut DispenseController<G> {
        &mut self.controller
    }

    /// Runner counters merged with what the sink worker has delivered so far.
    pub fn stats(&self) -> RunnerStats {
        let d = self.delivery.stats();
        RunnerStats {
            events_recorded: d.events_recorded,
            events_failed: d.events_failed,
            reports_sent: d.reports_sent,
            reports_failed: d.reports_failed,
            deliveries_dropped: d.dropped,
            ..self.stats
        }
    }

    /// Wait up to `timeout` for queued events and reports to reach the sink.
    pub fn settle(&self, timeout: Duration) -> bool {
        self.delivery.settle(timeout)
    }

    /// Run every step whose timer is due. Returns the tick outcome when the
    /// controller was evaluated this cycle.
    pub fn cycle(&mut self) -> Option<TickOutcome> {
        let now = self.clock.now();
        self.stats.cycles += 1;

        if self.sample_timer.due(now) {
            self.sample();
        }
        if self.controller.is_idle() {
            self.poll_requests(now);
        }
        let outcome = if self.tick_timer.due(now) {
            Some(self.controller.on_tick())
        } else {
            None
        };
        if self.flush_timer.due(now) {
            self.flush();
        }
        if self.telemetry_timer.due(now) {
            self.report_weight();
        }
        outcome
    }

    /// Cycle until `shutdown` is raised, then close the gate and flush.
    pub fn run(&mut self, shutdown: &AtomicBool) -> RunnerStats {
        tracing::info!(
            device_id = self.controller.device_id(),
            sources = self.requests.len(),
            "dispenser loop started"
        );
        let pause = Duration::from_millis(self.schedule.loop_ms);
        while !shutdown.load(Ordering::Relaxed) {
            self.cycle();
            self.clock.sleep(pause);
        }
        self.stop();
        if !self.settle(SHUTDOWN_DRAIN) {
            tracing::warn!("sink did not drain before shutdown");
        }
        let stats = self.stats();
        tracing::info!(?stats, "dispenser loop stopped");
        stats
    }

    /// Dispense `target_g` grams and return once the session has ended.
    ///
    /// A fresh sample is taken first so the baseline reflects the hopper as
    /// it is now. Raising `shutdown` aborts the session with the gate closed.
    pub fn dispense(&mut self, target_g: f32, shutdown: &AtomicBool) -> Result<DispenseSummary> {
        self.prime()?;
        let started = self.clock.now();
        if let StartOutcome::Rejected(reason) = self.controller.start_dispensing(target_g) {
            return Err(eyre::Report::new(DispenseError::Rejected(reason)));
        }
        let pause = Duration::from_millis(self.schedule.loop_ms);

        loop {
            if shutdown.load(Ordering::Relaxed) {
                let delivered_g = self.controller.abort().unwrap_or(0.0);
                self.flush();
                return Err(eyre::Report::new(DispenseError::Aborted { delivered_g }));
            }
            let (outcome, delivered_g) = match self.cycle() {
                Some(TickOutcome::Complete { delivered_g }) => {
                    (DispenseOutcome::Complete, delivered_g)
                }
                Some(TickOutcome::TimedOut { delivered_g }) => {
                    (DispenseOutcome::TimedOut, delivered_g)
                }
                _ => {
                    self.clock.sleep(pause);
                    continue;
                }
            };
            self.flush();
            return Ok(DispenseSummary {
                outcome,
                target_g,
                delivered_g,
                elapsed_ms: self.clock.ms_since(started),
            });
        }
    }

    /// Close the gate, ending any session with an abort event, and flush.
    pub fn stop(&mut self) {
        if let Some(delivered_g) = self.controller.abort() {
            tracing::warn!(delivered_g, "session aborted at shutdown");
        }
        self.flush();
    }

    /// Hand the outbox to the sink worker without waiting for delivery.
    /// Returns the number queued.
    pub fn flush(&mut self) -> usize {
        let mut queued = 0;
        for event in self.controller.take_events() {
            if self.delivery.send_event(event) {
                queued += 1;
            }
        }
        queued
    }

    /// Take a sample immediately, outside the sample timer.
    fn prime(&mut self) -> Result<()> {
        let now = self.clock.now();
        let sample = match &mut self.source {
            SampleSource::Direct(adapter) => adapter.read_mass(),
            SampleSource::Threaded(sampler) => {
                // A queued reading may be up to one period old; wait for the next one.
                let _ = sampler.latest();
                let wait_ms = self.schedule.sample_ms.saturating_mul(3).max(1000);
                sampler
                    .wait_for_sample(Duration::from_millis(wait_ms))
                    .ok_or_else(|| {
                        DispenseError::SensorUnavailable(format!(
                            "no sample from sampler within {wait_ms} ms"
                        ))
                    })
            }
        };
        let grams = sample.map_err(eyre::Report::new)?;
        self.controller.on_weight_sample(grams);
        self.sample_timer.mark(now);
        self.stats.samples += 1;
        self.consecutive_misses = 0;
        Ok(())
    }

    fn sample(&mut self) {
        let sample = match &mut self.source {
            SampleSource::Direct(adapter) => adapter.read_mass(),
            SampleSource::Threaded(sampler) => sampler.latest().ok_or_else(|| {
                DispenseError::SensorUnavailable(format!(
                    "no fresh sample; last good read {} ms ago",
                    sampler.stalled_for_ms()
                ))
            }),
        };
        match sample {
            Ok(grams) => {
                self.controller.on_weight_sample(grams);
                self.stats.samples += 1;
                if self.consecutive_misses > 0 {
                    tracing::info!(missed = self.consecutive_misses, "weight samples resumed");
                }
                self.consecutive_misses = 0;
                tracing::trace!(grams, "weight sample");
            }
            Err(e) => {
                self.stats.sensor_misses += 1;
                self.consecutive_misses = self.consecutive_misses.saturating_add(1);
                let last_g = self.controller.current_weight();
                if self.consecutive_misses == 1 {
                    tracing::warn!(error = %e, last_g, "weight sample skipped; keeping last weight");
                } else {
                    tracing::debug!(error = %e, misses = self.consecutive_misses, "weight sample skipped");
                }
            }
        }
    }

    fn poll_requests(&mut self, now: std::time::Instant) {
        for slot in &mut self.requests {
            if !slot.timer.due(now) {
                continue;
            }
            let request = match slot.source.poll() {
                Ok(Some(r)) => r,
                Ok(None) => continue,
                Err(e) => {
                    self.stats.request_errors += 1;
                    let err = DispenseError::Transport(e.to_string());
                    tracing::warn!(source = %slot.name, error = %err, "request poll failed");
                    continue;
                }
            };
            match self.controller.start_dispensing(request.target_g) {
                StartOutcome::Started => {
                    self.stats.requests_started += 1;
                    tracing::info!(
                        source = %slot.name,
                        id = request.id.as_deref().unwrap_or("-"),
                        target_g = request.target_g,
                        "dispense request accepted"
                    );
                    return;
                }
                StartOutcome::Rejected(reason) => {
                    self.stats.requests_rejected += 1;
                    tracing::warn!(
                        source = %slot.name,
                        id = request.id.as_deref().unwrap_or("-"),
                        %reason,
                        "dispense request rejected"
                    );
                }
            }
        }
    }

    fn report_weight(&mut self) {
        let report = WeightReport {
            weight: self.controller.current_weight(),
            timestamp: self.clock.timestamp(),
            device_id: self.controller.device_id().to_string(),
        };
        self.delivery.send_report(report);
    }
}
