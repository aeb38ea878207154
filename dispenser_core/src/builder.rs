//! Type-state builder for `DispenseController`.
//!
//! `build()` only exists once a gate has been supplied; the remaining
//! settings fall back to defaults and are validated on build.

use std::sync::Arc;

use dispenser_traits::{Clock, Gate, MonotonicClock};

use crate::config::{EventsCfg, SafetyCfg};
use crate::controller::DispenseController;
use crate::error::{BuildError, Result};

/// Type-state marker: no gate supplied yet.
pub struct Missing;

pub const DEFAULT_DEVICE_ID: &str = "ESP32_001";

pub struct DispenseControllerBuilder<G> {
    gate: Option<G>,
    device_id: Option<String>,
    safety: Option<SafetyCfg>,
    events: Option<EventsCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl Default for DispenseControllerBuilder<Missing> {
    fn default() -> Self {
        Self {
            gate: None,
            device_id: None,
            safety: None,
            events: None,
            clock: None,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<G> DispenseControllerBuilder<G> {
    pub fn with_device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }
    pub fn with_safety(mut self, safety: SafetyCfg) -> Self {
        self.safety = Some(safety);
        self
    }
    pub fn with_events(mut self, events: EventsCfg) -> Self {
        self.events = Some(events);
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl DispenseControllerBuilder<Missing> {
    pub fn with_gate<G: Gate>(self, gate: G) -> DispenseControllerBuilder<G> {
        DispenseControllerBuilder {
            gate: Some(gate),
            device_id: self.device_id,
            safety: self.safety,
            events: self.events,
            clock: self.clock,
        }
    }
}

impl<G: Gate> DispenseControllerBuilder<G> {
    /// Validate and build, reporting each problem as a `BuildError`.
    pub fn try_build(self) -> Result<DispenseController<G>> {
        let gate = self
            .gate
            .ok_or_else(|| eyre::Report::new(BuildError::MissingGate))?;
        let device_id = self
            .device_id
            .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string());
        let safety = self.safety.unwrap_or_default();
        let events = self.events.unwrap_or_default();

        if device_id.trim().is_empty() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "device_id must not be empty",
            )));
        }
        if !(safety.max_target_g.is_finite() && safety.max_target_g > 0.0) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_target_g must be > 0",
            )));
        }
        if events.max_pending == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_pending must be >= 1",
            )));
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        Ok(DispenseController::from_parts(
            gate,
            clock,
            device_id,
            safety,
            events.max_pending,
        ))
    }

    pub fn build(self) -> Result<DispenseController<G>> {
        self.try_build()
    }
}
