//! Test and helper mocks for dispenser_core.
//!
//! Handles are cheap clones sharing state, so a test can hand one copy to the
//! controller or runner and inspect the other.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use dispenser_traits::{
    Clock, DispenseEvent, DispenseRequest, EventSink, Gate, RequestSource, Scale, WeightReport,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// Deterministic clock: `sleep` advances time without blocking and
/// timestamps are derived from elapsed milliseconds.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        let mut off = lock(&self.offset);
        *off = off.saturating_add(d);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *lock(&self.offset)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }

    fn timestamp(&self) -> String {
        format!("t+{}ms", lock(&self.offset).as_millis())
    }
}

/// Gate that records every command. Can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingGate {
    commands: Arc<Mutex<Vec<bool>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    /// Every command attempted, `true` for open.
    pub fn commands(&self) -> Vec<bool> {
        lock(&self.commands).clone()
    }

    /// Last commanded position, if any.
    pub fn is_open(&self) -> Option<bool> {
        lock(&self.commands).last().copied()
    }
}

impl Gate for RecordingGate {
    fn set_gate(&mut self, open: bool) -> Result<(), BoxError> {
        lock(&self.commands).push(open);
        if *lock(&self.failing) {
            return Err(Box::new(std::io::Error::other("servo not responding")));
        }
        Ok(())
    }
}

/// In-memory sink. Can be told to fail every call.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<DispenseEvent>>>,
    reports: Arc<Mutex<Vec<WeightReport>>>,
    failing: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let s = Self::default();
        s.set_failing(true);
        s
    }

    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn events(&self) -> Vec<DispenseEvent> {
        lock(&self.events).clone()
    }

    pub fn reports(&self) -> Vec<WeightReport> {
        lock(&self.reports).clone()
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, event: &DispenseEvent) -> Result<(), BoxError> {
        if *lock(&self.failing) {
            return Err(Box::new(std::io::Error::other("backend unreachable")));
        }
        lock(&self.events).push(event.clone());
        Ok(())
    }

    fn report_weight(&mut self, report: &WeightReport) -> Result<(), BoxError> {
        if *lock(&self.failing) {
            return Err(Box::new(std::io::Error::other("backend unreachable")));
        }
        lock(&self.reports).push(report.clone());
        Ok(())
    }
}

/// Scale returning a fixed sequence of raw counts, then erroring.
pub struct SeqScale {
    values: VecDeque<i32>,
}

impl SeqScale {
    pub fn new(values: impl IntoIterator<Item = i32>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl Scale for SeqScale {
    fn read(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
        self.values
            .pop_front()
            .ok_or_else(|| Box::new(std::io::Error::other("sequence exhausted")) as BoxError)
    }
}

/// Request source that hands out queued requests one per poll.
#[derive(Debug, Clone, Default)]
pub struct QueuedRequests {
    queue: Arc<Mutex<VecDeque<DispenseRequest>>>,
    polls: Arc<Mutex<u32>>,
}

impl QueuedRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: DispenseRequest) {
        lock(&self.queue).push_back(request);
    }

    pub fn polls(&self) -> u32 {
        *lock(&self.polls)
    }

    pub fn remaining(&self) -> usize {
        lock(&self.queue).len()
    }
}

impl RequestSource for QueuedRequests {
    fn poll(&mut self) -> Result<Option<DispenseRequest>, BoxError> {
        *lock(&self.polls) += 1;
        Ok(lock(&self.queue).pop_front())
    }
}
