//! Simulated hopper: a load cell and a gate sharing one pile of rice.
//!
//! Every raw read while the gate is open drains `flow_g_per_read` grams, so
//! the controller sees the hopper weight fall exactly as it would on the
//! real node where the load cell carries the hopper.

use std::sync::{Arc, Mutex, MutexGuard};

use dispenser_traits::{Gate, Scale};

use crate::error::HwError;

#[derive(Debug, Clone)]
struct HopperState {
    mass_g: f32,
    gate_open: bool,
    flow_g_per_read: f32,
    gain_g_per_count: f32,
    zero_counts: i32,
    /// Sensor returns the same value regardless of flow
    stuck: bool,
    /// Every read fails with a timeout
    sensor_offline: bool,
    /// Gate commands fail
    gate_jammed: bool,
    gate_commands: u32,
    reads: u64,
}

/// Shared state behind `SimulatedScale` and `SimulatedGate`.
#[derive(Debug, Clone)]
pub struct SimulatedHopper {
    state: Arc<Mutex<HopperState>>,
}

impl SimulatedHopper {
    /// Hopper holding `mass_g` grams, read through a linear load cell with
    /// `gain_g_per_count` grams per count and `zero_counts` tare.
    pub fn new(mass_g: f32, gain_g_per_count: f32, zero_counts: i32) -> Self {
        Self {
            state: Arc::new(Mutex::new(HopperState {
                mass_g: mass_g.max(0.0),
                gate_open: false,
                flow_g_per_read: 2.0,
                gain_g_per_count,
                zero_counts,
                stuck: false,
                sensor_offline: false,
                gate_jammed: false,
                gate_commands: 0,
                reads: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HopperState> {
        // A panicked holder leaves plain data behind; keep using it.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn with_flow(self, flow_g_per_read: f32) -> Self {
        self.lock().flow_g_per_read = flow_g_per_read.max(0.0);
        self
    }

    pub fn set_stuck(&self, stuck: bool) {
        self.lock().stuck = stuck;
    }

    pub fn set_sensor_offline(&self, offline: bool) {
        self.lock().sensor_offline = offline;
    }

    pub fn set_gate_jammed(&self, jammed: bool) {
        self.lock().gate_jammed = jammed;
    }

    pub fn mass_g(&self) -> f32 {
        self.lock().mass_g
    }

    pub fn is_open(&self) -> bool {
        self.lock().gate_open
    }

    /// Number of gate commands accepted so far.
    pub fn gate_commands(&self) -> u32 {
        self.lock().gate_commands
    }

    pub fn reads(&self) -> u64 {
        self.lock().reads
    }

    pub fn scale(&self) -> SimulatedScale {
        SimulatedScale {
            hopper: self.clone(),
        }
    }

    pub fn gate(&self) -> SimulatedGate {
        SimulatedGate {
            hopper: self.clone(),
        }
    }
}

/// Simulated load cell returning raw counts.
pub struct SimulatedScale {
    hopper: SimulatedHopper,
}

impl Scale for SimulatedScale {
    fn read(
        &mut self,
        _timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.hopper.lock();
        if s.sensor_offline {
            return Err(Box::new(HwError::Timeout));
        }
        s.reads = s.reads.saturating_add(1);
        if s.gate_open && !s.stuck {
            s.mass_g = (s.mass_g - s.flow_g_per_read).max(0.0);
        }
        let counts = (s.mass_g / s.gain_g_per_count).round() as i32;
        let raw = counts.saturating_add(s.zero_counts);
        tracing::trace!(raw, mass_g = s.mass_g, "simulated scale read");
        Ok(raw)
    }
}

/// Simulated gate; opening it lets the hopper drain on subsequent reads.
pub struct SimulatedGate {
    hopper: SimulatedHopper,
}

impl Gate for SimulatedGate {
    fn set_gate(&mut self, open: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.hopper.lock();
        if s.gate_jammed {
            return Err(Box::new(HwError::Simulated("gate jammed")));
        }
        s.gate_open = open;
        s.gate_commands = s.gate_commands.saturating_add(1);
        tracing::debug!(open, "gate (simulated)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const T: Duration = Duration::from_millis(10);

    #[test]
    fn closed_gate_holds_mass() {
        let hopper = SimulatedHopper::new(100.0, 0.01, 0);
        let mut scale = hopper.scale();
        let a = scale.read(T).unwrap();
        let b = scale.read(T).unwrap();
        assert_eq!(a, 10_000);
        assert_eq!(a, b);
    }

    #[test]
    fn open_gate_drains_per_read() {
        let hopper = SimulatedHopper::new(100.0, 0.01, 0).with_flow(5.0);
        let mut scale = hopper.scale();
        let mut gate = hopper.gate();
        gate.set_gate(true).unwrap();
        assert_eq!(scale.read(T).unwrap(), 9_500);
        assert_eq!(scale.read(T).unwrap(), 9_000);
        gate.set_gate(false).unwrap();
        assert_eq!(scale.read(T).unwrap(), 9_000);
        assert_eq!(hopper.gate_commands(), 2);
    }

    #[test]
    fn hopper_never_goes_negative() {
        let hopper = SimulatedHopper::new(3.0, 0.01, 0).with_flow(5.0);
        let mut scale = hopper.scale();
        hopper.gate().set_gate(true).unwrap();
        scale.read(T).unwrap();
        assert_eq!(hopper.mass_g(), 0.0);
    }

    #[test]
    fn negative_gain_and_tare_round_trip() {
        // Reference load cell reads negative counts per gram
        let gain = -1.0 / 7050.0;
        let hopper = SimulatedHopper::new(200.0, gain, 8_000);
        let raw = hopper.scale().read(T).unwrap();
        let grams = gain * (raw - 8_000) as f32;
        assert!((grams - 200.0).abs() < 0.01, "grams={grams}");
    }

    #[test]
    fn faults_surface_as_errors() {
        let hopper = SimulatedHopper::new(10.0, 0.01, 0);
        hopper.set_sensor_offline(true);
        let err = hopper.scale().read(T).unwrap_err();
        assert!(err.to_string().contains("timeout"));

        hopper.set_gate_jammed(true);
        assert!(hopper.gate().set_gate(true).is_err());
        assert!(!hopper.is_open());
    }

    #[test]
    fn stuck_sensor_ignores_flow() {
        let hopper = SimulatedHopper::new(50.0, 0.01, 0);
        hopper.set_stuck(true);
        hopper.gate().set_gate(true).unwrap();
        let mut scale = hopper.scale();
        scale.read(T).unwrap();
        scale.read(T).unwrap();
        assert_eq!(hopper.mass_g(), 50.0);
        assert_eq!(hopper.reads(), 2);
    }
}
