use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `is_ready` until it reports true or `timeout` expires, sleeping
/// `poll_interval` between polls. Returns how long the wait took.
pub fn wait_for_ready(
    mut is_ready: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Duration> {
    let start = Instant::now();
    let deadline = start + timeout;
    while !is_ready() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(start.elapsed())
}

/// Servo pulse width for `angle_deg` on a standard 500..2500 us, 0..180 degree servo.
pub fn servo_pulse_us(angle_deg: u8) -> u64 {
    let angle = u64::from(angle_deg.min(180));
    500 + angle * 2000 / 180
}

#[cfg(test)]
mod tests {
    use super::servo_pulse_us;

    #[test]
    fn servo_pulse_endpoints_and_midpoint() {
        assert_eq!(servo_pulse_us(0), 500);
        assert_eq!(servo_pulse_us(90), 1500);
        assert_eq!(servo_pulse_us(180), 2500);
        // clamped
        assert_eq!(servo_pulse_us(255), 2500);
    }
}
