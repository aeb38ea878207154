//! Weight sensor adapter: averaged, calibrated, non-negative mass readings.

use std::time::Duration;

use dispenser_traits::Scale;

use crate::calibration::Calibration;
use crate::config::SensorCfg;
use crate::error::DispenseError;
use crate::hw_error::map_hw_error;

/// Wraps a raw-count `Scale` and produces mass samples in grams.
pub struct LoadCellAdapter<S: Scale> {
    scale: S,
    calibration: Calibration,
    cfg: SensorCfg,
}

impl<S: Scale> LoadCellAdapter<S> {
    pub fn new(scale: S, calibration: Calibration, cfg: SensorCfg) -> Self {
        Self {
            scale,
            calibration,
            cfg: SensorCfg {
                average_samples: cfg.average_samples.max(1),
                ..cfg
            },
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// One mass sample: the mean of `average_samples` raw reads, calibrated
    /// and clamped to be non-negative.
    ///
    /// Any failed raw read fails the whole sample; partial averages are not
    /// reported.
    pub fn read_mass(&mut self) -> Result<f32, DispenseError> {
        let counts = self.read_average_counts()?;
        let grams = self.calibration.counts_to_grams(counts);
        if !grams.is_finite() {
            return Err(DispenseError::SensorUnavailable(
                "calibrated reading is not finite".into(),
            ));
        }
        Ok(grams.max(0.0))
    }

    /// Store the current averaged reading as the zero point and return it.
    ///
    /// Only meaningful with an empty hopper.
    pub fn tare(&mut self) -> Result<i32, DispenseError> {
        let counts = self.read_average_counts()?;
        let zero = counts.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
        self.calibration.zero_counts = zero;
        tracing::info!(zero_counts = zero, "scale tared");
        Ok(zero)
    }

    fn read_average_counts(&mut self) -> Result<f64, DispenseError> {
        let timeout = Duration::from_millis(self.cfg.read_timeout_ms);
        let n = self.cfg.average_samples;
        let mut sum: i64 = 0;
        for _ in 0..n {
            let raw = self.scale.read(timeout).map_err(|e| {
                let mapped = map_hw_error(&*e);
                tracing::debug!(error = %mapped, "raw scale read failed");
                DispenseError::SensorUnavailable(mapped.to_string())
            })?;
            sum += i64::from(raw);
        }
        Ok(sum as f64 / n as f64)
    }
}
