//! `From` implementations bridging `dispenser_config` types to core types.

use crate::calibration::Calibration;
use crate::config::{EventsCfg, SafetyCfg, ScheduleCfg, SensorCfg};
use crate::runner::SamplingMode;

impl From<&dispenser_config::Safety> for SafetyCfg {
    fn from(c: &dispenser_config::Safety) -> Self {
        Self {
            max_dispense_ms: c.max_dispense_ms,
            max_target_g: c.max_target_g,
        }
    }
}

impl From<&dispenser_config::SensorCfg> for SensorCfg {
    fn from(c: &dispenser_config::SensorCfg) -> Self {
        Self {
            average_samples: c.average_samples,
            read_timeout_ms: c.read_timeout_ms,
        }
    }
}

// request_poll_ms is per request source; see `Dispenser::add_request_source`.
impl From<&dispenser_config::ScheduleCfg> for ScheduleCfg {
    fn from(c: &dispenser_config::ScheduleCfg) -> Self {
        Self {
            sample_ms: c.sample_ms,
            tick_ms: c.tick_ms,
            flush_ms: c.flush_ms,
            telemetry_ms: c.telemetry_ms,
            loop_ms: c.loop_ms,
        }
    }
}

impl From<&dispenser_config::EventsCfg> for EventsCfg {
    fn from(c: &dispenser_config::EventsCfg) -> Self {
        Self {
            max_pending: c.max_pending,
        }
    }
}

impl From<&dispenser_config::CalibrationCfg> for Calibration {
    fn from(c: &dispenser_config::CalibrationCfg) -> Self {
        Self {
            gain_g_per_count: c.gain_g_per_count,
            zero_counts: c.zero_counts,
            offset_g: c.offset_g,
        }
    }
}

impl From<dispenser_config::RunMode> for SamplingMode {
    fn from(m: dispenser_config::RunMode) -> Self {
        match m {
            dispenser_config::RunMode::Direct => SamplingMode::Direct,
            dispenser_config::RunMode::Threaded => SamplingMode::Threaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [pins]
        hx711_dt = 5
        hx711_sck = 6
        servo = 18

        [safety]
        max_dispense_ms = 1234

        [runner]
        mode = "threaded"
    "#;

    #[test]
    fn config_sections_map_onto_core_types() {
        let cfg = dispenser_config::load_toml(MINIMAL).unwrap();
        let safety = SafetyCfg::from(&cfg.safety);
        assert_eq!(safety.max_dispense_ms, 1234);
        let sensor = SensorCfg::from(&cfg.sensor);
        assert_eq!(sensor.average_samples, 5);
        let sched = ScheduleCfg::from(&cfg.schedule);
        assert_eq!((sched.sample_ms, sched.telemetry_ms), (1000, 5000));
        assert_eq!(EventsCfg::from(&cfg.events).max_pending, 32);
        assert_eq!(Calibration::from(&cfg.calibration), Calibration::default());
        assert!(matches!(
            SamplingMode::from(cfg.runner.mode),
            SamplingMode::Threaded
        ));
    }
}
