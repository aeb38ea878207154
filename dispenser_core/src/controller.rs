//! Dispense controller: the Idle/Dispensing state machine.
//!
//! The controller never touches the sensor. Weight arrives through
//! `on_weight_sample`, decisions are taken in `on_tick`, and events are
//! queued in a bounded outbox that the runner drains into an `EventSink`.

use std::collections::VecDeque;
use std::sync::Arc;

use dispenser_traits::{Clock, DispenseAction, DispenseEvent, Gate};

use crate::builder::{DispenseControllerBuilder, Missing};
use crate::config::SafetyCfg;
use crate::error::{DispenseError, RejectReason};
use crate::hw_error::map_hw_error;
use crate::session::DispenseSession;
use crate::status::{DispenseState, StartOutcome, TickOutcome};

pub struct DispenseController<G> {
    gate: G,
    clock: Arc<dyn Clock + Send + Sync>,
    device_id: String,
    safety: SafetyCfg,
    current_weight_g: f32,
    session: Option<DispenseSession>,
    outbox: VecDeque<DispenseEvent>,
    max_pending: usize,
    dropped_events: u64,
    gate_faults: u64,
}

impl<G: Gate> core::fmt::Debug for DispenseController<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DispenseController")
            .field("device_id", &self.device_id)
            .field("current_weight_g", &self.current_weight_g)
            .field("session", &self.session)
            .field("pending_events", &self.outbox.len())
            .finish()
    }
}

impl DispenseController<Missing> {
    /// Start building a controller.
    pub fn builder() -> DispenseControllerBuilder<Missing> {
        DispenseControllerBuilder::default()
    }
}

impl<G: Gate> DispenseController<G> {
    pub(crate) fn from_parts(
        gate: G,
        clock: Arc<dyn Clock + Send + Sync>,
        device_id: String,
        safety: SafetyCfg,
        max_pending: usize,
    ) -> Self {
        Self {
            gate,
            clock,
            device_id,
            safety,
            current_weight_g: 0.0,
            session: None,
            outbox: VecDeque::with_capacity(max_pending),
            max_pending,
            dropped_events: 0,
            gate_faults: 0,
        }
    }

    /// Begin a dispense of `target_g` grams from the current weight.
    ///
    /// Rejected requests leave every field untouched and emit no event.
    pub fn start_dispensing(&mut self, target_g: f32) -> StartOutcome {
        if let Some(active) = &self.session {
            tracing::warn!(
                requested_g = target_g,
                active_target_g = active.target_g,
                "dispense already in progress; request dropped"
            );
            return StartOutcome::Rejected(RejectReason::Busy);
        }
        if !(target_g.is_finite() && target_g > 0.0 && target_g <= self.safety.max_target_g) {
            tracing::warn!(
                target_g,
                max_target_g = self.safety.max_target_g,
                "invalid dispense target; request dropped"
            );
            return StartOutcome::Rejected(RejectReason::InvalidTarget);
        }

        let baseline_g = self.current_weight_g;
        self.session = Some(DispenseSession::new(target_g, baseline_g, self.clock.now()));
        self.command_gate(true);
        self.emit(DispenseAction::Start, target_g);
        tracing::info!(target_g, baseline_g, "dispense started");
        StartOutcome::Started
    }

    /// Record a new weight sample. Negatives clamp to 0; NaN/inf are ignored.
    pub fn on_weight_sample(&mut self, sample_g: f32) {
        if !sample_g.is_finite() {
            tracing::debug!(sample_g, "ignoring non-finite weight sample");
            return;
        }
        self.current_weight_g = sample_g.max(0.0);
    }

    /// Evaluate the active session against the latest weight.
    pub fn on_tick(&mut self) -> TickOutcome {
        let Some(session) = self.session else {
            return TickOutcome::Idle;
        };
        let delivered_g = session.delivered(self.current_weight_g);

        if session.is_satisfied(self.current_weight_g) {
            self.finish(DispenseAction::Complete, delivered_g);
            tracing::info!(
                target_g = session.target_g,
                delivered_g,
                "dispense complete"
            );
            return TickOutcome::Complete { delivered_g };
        }

        let max_ms = self.safety.max_dispense_ms;
        if max_ms > 0 {
            let elapsed_ms = self.clock.ms_since(session.started_at);
            if elapsed_ms >= max_ms {
                self.finish(DispenseAction::Timeout, delivered_g);
                tracing::warn!(
                    target_g = session.target_g,
                    delivered_g,
                    elapsed_ms,
                    "dispense timed out; gate forced closed"
                );
                return TickOutcome::TimedOut { delivered_g };
            }
        }

        tracing::trace!(delivered_g, target_g = session.target_g, "dispensing");
        TickOutcome::Dispensing { delivered_g }
    }

    /// Close the gate now. An active session ends with an `abort` event and
    /// its delivered mass is returned.
    pub fn abort(&mut self) -> Option<f32> {
        self.command_gate(false);
        let session = self.session.take()?;
        let delivered_g = session.delivered(self.current_weight_g);
        self.emit(DispenseAction::Abort, delivered_g);
        tracing::warn!(
            target_g = session.target_g,
            delivered_g,
            "dispense aborted"
        );
        Some(delivered_g)
    }

    /// Mass delivered in the active session; 0 when idle.
    pub fn delivered_mass(&self) -> f32 {
        self.session
            .map(|s| s.delivered(self.current_weight_g))
            .unwrap_or(0.0)
    }

    pub fn state(&self) -> DispenseState {
        if self.session.is_some() {
            DispenseState::Dispensing
        } else {
            DispenseState::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.session.is_none()
    }

    pub fn session(&self) -> Option<&DispenseSession> {
        self.session.as_ref()
    }

    pub fn current_weight(&self) -> f32 {
        self.current_weight_g
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Drain queued events, oldest first.
    pub fn take_events(&mut self) -> std::collections::vec_deque::Drain<'_, DispenseEvent> {
        self.outbox.drain(..)
    }

    pub fn pending_events(&self) -> usize {
        self.outbox.len()
    }

    /// Events discarded because the outbox was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Gate commands that returned an error.
    pub fn gate_faults(&self) -> u64 {
        self.gate_faults
    }

    fn finish(&mut self, action: DispenseAction, delivered_g: f32) {
        self.command_gate(false);
        self.emit(action, delivered_g);
        self.session = None;
    }

    fn command_gate(&mut self, open: bool) {
        if let Err(e) = self.gate.set_gate(open) {
            self.gate_faults = self.gate_faults.saturating_add(1);
            let err = DispenseError::Actuator(map_hw_error(&*e).to_string());
            tracing::error!(open, error = %err, "gate command failed");
        }
    }

    fn emit(&mut self, action: DispenseAction, weight: f32) {
        if self.outbox.len() >= self.max_pending
            && let Some(old) = self.outbox.pop_front()
        {
            self.dropped_events = self.dropped_events.saturating_add(1);
            tracing::warn!(
                dropped_action = %old.action,
                dropped_timestamp = %old.timestamp,
                max_pending = self.max_pending,
                "event outbox full; dropping oldest event"
            );
        }
        self.outbox.push_back(DispenseEvent {
            action,
            weight,
            timestamp: self.clock.timestamp(),
            device_id: self.device_id.clone(),
        });
    }
}
