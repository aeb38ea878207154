//! Configuration types for the dispensing engine.
//!
//! These are the runtime structs used by the controller, sensor adapter and
//! runner. They are separate from the TOML-deserialized config in
//! `dispenser_config`; see `conversions` for the bridge.

/// Safety limits applied by the controller.
#[derive(Debug, Clone, Copy)]
pub struct SafetyCfg {
    /// Force the gate closed after a session has been open this long.
    /// 0 disables the limit.
    pub max_dispense_ms: u64,
    /// Largest target accepted by `start_dispensing`.
    pub max_target_g: f32,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            max_dispense_ms: 60_000,
            max_target_g: 5000.0,
        }
    }
}

/// Load-cell acquisition settings.
#[derive(Debug, Clone, Copy)]
pub struct SensorCfg {
    /// Raw reads averaged into one mass sample (>= 1).
    pub average_samples: usize,
    /// Per raw read timeout.
    pub read_timeout_ms: u64,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            average_samples: 5,
            read_timeout_ms: 150,
        }
    }
}

/// Cadences of the cyclic runner, in milliseconds.
///
/// A period of 0 disables the corresponding step, except `loop_ms` where 0
/// means "do not sleep between cycles".
#[derive(Debug, Clone, Copy)]
pub struct ScheduleCfg {
    pub sample_ms: u64,
    pub tick_ms: u64,
    pub flush_ms: u64,
    pub telemetry_ms: u64,
    pub loop_ms: u64,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            sample_ms: 1000,
            tick_ms: 100,
            flush_ms: 1000,
            telemetry_ms: 5000,
            loop_ms: 100,
        }
    }
}

/// Event outbox sizing.
#[derive(Debug, Clone, Copy)]
pub struct EventsCfg {
    /// Events held between flushes; the oldest is dropped past this.
    pub max_pending: usize,
}

impl Default for EventsCfg {
    fn default() -> Self {
        Self { max_pending: 32 }
    }
}
