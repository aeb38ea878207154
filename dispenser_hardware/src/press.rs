//! Debounced push-button edge detection.

/// Turns raw "pressed" polls into one event per press.
///
/// A press registers after `debounce_n` consecutive pressed polls and
/// fires exactly once; the button must be seen released before the next
/// press can register.
#[derive(Debug, Clone)]
pub struct PressDetector {
    debounce_n: u8,
    count: u8,
    latched: bool,
}

impl PressDetector {
    pub fn new(debounce_n: u8) -> Self {
        Self {
            debounce_n: debounce_n.max(1),
            count: 0,
            latched: false,
        }
    }

    /// Feed one poll; returns true on the poll where a press registers.
    pub fn update(&mut self, pressed: bool) -> bool {
        if !pressed {
            self.count = 0;
            self.latched = false;
            return false;
        }
        if self.latched {
            return false;
        }
        self.count = self.count.saturating_add(1);
        if self.count >= self.debounce_n {
            self.latched = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::PressDetector;
    use rstest::rstest;

    fn fire_count(debounce_n: u8, polls: &[bool]) -> usize {
        let mut d = PressDetector::new(debounce_n);
        polls.iter().filter(|&&p| d.update(p)).count()
    }

    #[rstest]
    #[case(1, &[true], 1)]
    #[case(2, &[true], 0)]
    #[case(2, &[true, true], 1)]
    #[case(2, &[true, true, true, true], 1)]
    #[case(3, &[true, false, true, false, true], 0)]
    #[case(2, &[true, true, false, true, true], 2)]
    #[case(0, &[true], 1)]
    fn debounce_cases(#[case] n: u8, #[case] polls: &[bool], #[case] expected: usize) {
        assert_eq!(fire_count(n, polls), expected);
    }
}
