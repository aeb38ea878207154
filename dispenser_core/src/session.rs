use std::time::Instant;

/// One active dispense: what was asked for and where the hopper started.
#[derive(Debug, Clone, Copy)]
pub struct DispenseSession {
    pub target_g: f32,
    /// Hopper weight when the session started.
    pub baseline_g: f32,
    pub started_at: Instant,
}

impl DispenseSession {
    pub(crate) fn new(target_g: f32, baseline_g: f32, started_at: Instant) -> Self {
        Self {
            target_g,
            baseline_g,
            started_at,
        }
    }

    /// Mass that has left the hopper since the session started, never negative.
    pub fn delivered(&self, current_g: f32) -> f32 {
        (self.baseline_g - current_g).max(0.0)
    }

    /// True once the delivered mass has reached the target.
    pub fn is_satisfied(&self, current_g: f32) -> bool {
        self.delivered(current_g) >= self.target_g
    }
}

#[cfg(test)]
mod tests {
    use super::DispenseSession;
    use rstest::rstest;
    use std::time::Instant;

    #[rstest]
    #[case(200.0, 200.0, 0.0)]
    #[case(200.0, 150.0, 50.0)]
    #[case(200.0, 210.0, 0.0)]
    #[case(0.0, 0.0, 0.0)]
    fn delivered_is_baseline_minus_current(
        #[case] baseline: f32,
        #[case] current: f32,
        #[case] expected: f32,
    ) {
        let s = DispenseSession::new(50.0, baseline, Instant::now());
        assert_eq!(s.delivered(current), expected);
    }

    #[test]
    fn satisfied_at_exactly_target() {
        let s = DispenseSession::new(50.0, 200.0, Instant::now());
        assert!(!s.is_satisfied(150.5));
        assert!(s.is_satisfied(150.0));
    }
}
