use dispenser_traits::{DispenseRequest, RequestSource};
use rppal::gpio::{Gpio, InputPin};

use crate::error::{HwError, Result};
use crate::press::PressDetector;

/// Manual dispense push-button (active low with internal pull-up).
/// Each debounced press yields one request for `grams`.
pub struct ButtonTrigger {
    pin: InputPin,
    detector: PressDetector,
    grams: f32,
}

impl ButtonTrigger {
    pub fn new(pin: u8, grams: f32, debounce_n: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("open button pin {pin}: {e}")))?
            .into_input_pullup();
        Ok(Self {
            pin,
            detector: PressDetector::new(debounce_n),
            grams,
        })
    }
}

impl RequestSource for ButtonTrigger {
    fn poll(
        &mut self,
    ) -> std::result::Result<Option<DispenseRequest>, Box<dyn std::error::Error + Send + Sync>> {
        if self.detector.update(self.pin.is_low()) {
            tracing::info!(grams = self.grams, "manual dispense button pressed");
            return Ok(Some(DispenseRequest::grams(self.grams)));
        }
        Ok(None)
    }
}
