/// Linear calibration from raw load-cell counts to grams.
/// grams = gain_g_per_count * (raw - zero_counts) + offset_g
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub gain_g_per_count: f32,
    pub zero_counts: i32,
    pub offset_g: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            gain_g_per_count: -1.0 / 7050.0,
            zero_counts: 0,
            offset_g: 0.0,
        }
    }
}

impl Calibration {
    pub fn to_grams(&self, raw: i32) -> f32 {
        self.counts_to_grams(f64::from(raw))
    }

    /// Convert an averaged (fractional) count to grams.
    pub fn counts_to_grams(&self, counts: f64) -> f32 {
        let delta = counts - f64::from(self.zero_counts);
        (f64::from(self.gain_g_per_count) * delta + f64::from(self.offset_g)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::Calibration;

    #[test]
    fn applies_gain_zero_and_offset() {
        let c = Calibration {
            gain_g_per_count: 0.5,
            zero_counts: 100,
            offset_g: 1.0,
        };
        assert_eq!(c.to_grams(100), 1.0);
        assert_eq!(c.to_grams(120), 11.0);
        assert_eq!(c.counts_to_grams(101.0), 1.5);
    }

    #[test]
    fn negative_gain_reads_positive_mass() {
        let c = Calibration::default();
        let g = c.to_grams(-7050 * 200);
        assert!((g - 200.0).abs() < 1e-3, "g={g}");
    }
}
