//! Hardware backends for the dispenser node.
//!
//! The simulated hopper is always available; the HX711 load cell, servo
//! gate and push-button need the `hardware` feature (Raspberry Pi GPIO).
pub mod error;
pub mod press;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod button;
#[cfg(feature = "hardware")]
pub mod hx711;
#[cfg(feature = "hardware")]
pub mod servo;

pub use press::PressDetector;
pub use sim::{SimulatedGate, SimulatedHopper, SimulatedScale};

#[cfg(feature = "hardware")]
pub use button::ButtonTrigger;
#[cfg(feature = "hardware")]
pub use hx711::HardwareScale;
#[cfg(feature = "hardware")]
pub use servo::ServoGate;
