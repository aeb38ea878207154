//! Maps `Box<dyn Error>` from trait boundaries to typed `DispenseError`.
//!
//! The seams in `dispenser_traits` return `Box<dyn Error + Send + Sync>`;
//! with the `hardware-errors` feature, `dispenser_hardware::HwError` is
//! downcast for a precise mapping.

use crate::error::DispenseError;

/// Map a trait-boundary error to a typed `DispenseError`.
///
/// Known hardware errors are downcast first, then the message is inspected.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> DispenseError {
    #[cfg(feature = "hardware-errors")]
    {
        use dispenser_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => DispenseError::SensorTimeout,
                other => DispenseError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        DispenseError::SensorTimeout
    } else {
        DispenseError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_messages_map_to_sensor_timeout() {
        let e = std::io::Error::other("read timeout on DT");
        assert!(matches!(map_hw_error(&e), DispenseError::SensorTimeout));
    }

    #[test]
    fn other_messages_keep_their_text() {
        let e = std::io::Error::other("gpio busy");
        match map_hw_error(&e) {
            DispenseError::Hardware(s) => assert_eq!(s, "gpio busy"),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hw_errors_are_downcast() {
        use dispenser_hardware::error::HwError;
        let e = HwError::DataReadyTimeout;
        assert!(matches!(map_hw_error(&e), DispenseError::SensorTimeout));
        let e = HwError::Gpio("pin 5 claimed".into());
        assert!(matches!(map_hw_error(&e), DispenseError::Hardware(_)));
    }
}
