use std::time::Duration;

use dispenser_traits::Gate;
use rppal::gpio::{Gpio, OutputPin};

use crate::error::{HwError, Result};
use crate::util::servo_pulse_us;

/// Standard hobby servo frame.
const SERVO_PERIOD: Duration = Duration::from_millis(20);

/// Servo-driven dispenser gate on a software-PWM GPIO pin.
pub struct ServoGate {
    pin: OutputPin,
    open_us: u64,
    closed_us: u64,
}

impl ServoGate {
    pub fn new(pin: u8, open_angle_deg: u8, closed_angle_deg: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("open servo pin {pin}: {e}")))?
            .into_output_low();
        let mut gate = Self {
            pin,
            open_us: servo_pulse_us(open_angle_deg),
            closed_us: servo_pulse_us(closed_angle_deg),
        };
        // start closed
        gate.drive(false)?;
        Ok(gate)
    }

    fn drive(&mut self, open: bool) -> Result<()> {
        let pulse = if open { self.open_us } else { self.closed_us };
        self.pin
            .set_pwm(SERVO_PERIOD, Duration::from_micros(pulse))
            .map_err(|e| HwError::Pwm(e.to_string()))
    }
}

impl Gate for ServoGate {
    fn set_gate(&mut self, open: bool) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.drive(open)?;
        tracing::debug!(open, "servo gate");
        Ok(())
    }
}
