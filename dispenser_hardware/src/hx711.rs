use std::time::Duration;

use dispenser_traits::Scale;
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::wait_for_ready;

/// Extra clock pulses after the 24 data bits select the next conversion:
/// 1 => channel A gain 128, 2 => channel B gain 32, 3 => channel A gain 64.
const GAIN_128_PULSES: u8 = 1;

pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    gain_pulses: u8,
}

impl Hx711 {
    pub fn open(dt_pin: u8, sck_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 dt pin {dt_pin}: {e}")))?
            .into_input();
        // clock idle low; holding it high >60us powers the chip down
        let sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 sck pin {sck_pin}: {e}")))?
            .into_output_low();
        Ok(Self {
            dt,
            sck,
            gain_pulses: GAIN_128_PULSES,
        })
    }

    /// DT low means a conversion is ready to be clocked out.
    pub fn is_ready(&self) -> bool {
        self.dt.is_low()
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        wait_for_ready(|| self.is_ready(), timeout, Duration::from_micros(200))?;

        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay();
        }
        for _ in 0..self.gain_pulses {
            self.sck.set_high();
            spin_delay();
            self.sck.set_low();
            spin_delay();
        }

        // Sign extend 24-bit two's complement
        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }
}

#[inline(always)]
fn spin_delay() {
    std::hint::spin_loop();
}

/// HX711 load cell exposed as a `Scale`, retrying a few data-ready timeouts.
pub struct HardwareScale {
    hx711: Hx711,
    max_retries: u8,
}

impl HardwareScale {
    pub fn new(dt_pin: u8, sck_pin: u8) -> Result<Self> {
        Ok(Self {
            hx711: Hx711::open(dt_pin, sck_pin)?,
            max_retries: 3,
        })
    }
}

impl Scale for HardwareScale {
    fn read(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let mut attempts = 0;
        loop {
            match self.hx711.read_with_timeout(timeout) {
                Ok(raw) => return Ok(raw),
                Err(HwError::DataReadyTimeout) if attempts < self.max_retries => {
                    attempts += 1;
                    tracing::warn!(retries = attempts, "hx711 timeout, retrying");
                }
                Err(e) => {
                    tracing::error!(error = %e, "hx711 read failed");
                    return Err(Box::new(e));
                }
            }
        }
    }
}
