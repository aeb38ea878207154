//! Interval timers gating each step of the runner cycle.

use std::time::{Duration, Instant};

/// Fires at most once per `period`, measured on the caller's clock.
///
/// The first call to `due` fires immediately. A zero period never fires.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTimer {
    period: Duration,
    last: Option<Instant>,
}

impl IntervalTimer {
    pub fn from_ms(period_ms: u64) -> Self {
        Self {
            period: Duration::from_millis(period_ms),
            last: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.period.is_zero()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// True when the period has elapsed since the last firing; records `now`
    /// as the new firing time.
    pub fn due(&mut self, now: Instant) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let fire = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        };
        if fire {
            self.last = Some(now);
        }
        fire
    }

    /// Treat `now` as a firing without running the step.
    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::IntervalTimer;
    use std::time::{Duration, Instant};

    #[test]
    fn fires_first_then_each_period() {
        let t0 = Instant::now();
        let mut t = IntervalTimer::from_ms(100);
        assert!(t.due(t0));
        assert!(!t.due(t0 + Duration::from_millis(99)));
        assert!(t.due(t0 + Duration::from_millis(100)));
        assert!(!t.due(t0 + Duration::from_millis(150)));
        assert!(t.due(t0 + Duration::from_millis(250)));
    }

    #[test]
    fn zero_period_never_fires() {
        let mut t = IntervalTimer::from_ms(0);
        assert!(!t.is_enabled());
        assert!(!t.due(Instant::now()));
    }

    #[test]
    fn mark_defers_the_next_firing() {
        let t0 = Instant::now();
        let mut t = IntervalTimer::from_ms(1000);
        t.mark(t0);
        assert!(!t.due(t0 + Duration::from_millis(10)));
        assert!(t.due(t0 + Duration::from_millis(1000)));
    }
}
