//! Human-readable error descriptions and structured JSON error formatting.

use crate::cli::MAX_DISPENSE_MS;
use dispenser_core::error::{BuildError, DispenseError, RejectReason};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingGate => {
                "What happened: No gate actuator was provided to the controller.\nLikely causes: The servo failed to initialize or was not wired into the builder.\nHow to fix: Ensure the gate is created successfully and passed via with_gate(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/dispenser.toml for a sample."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DispenseError>() {
        return match de {
            DispenseError::Timeout { delivered_g } => format!(
                "What happened: Dispense timed out after delivering {delivered_g:.1} g; the gate was closed.\nLikely causes: Empty or jammed hopper, gate not opening, or a load cell that stopped changing.\nHow to fix: Check the hopper and gate mechanics; raise safety.max_dispense_ms (or --max-dispense-ms) for large targets."
            ),
            DispenseError::SensorUnavailable(_) | DispenseError::SensorTimeout => {
                "What happened: The load cell did not return a usable reading.\nLikely causes: HX711 not wired correctly, no power/ground, or sensor.read_timeout_ms too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing sensor.read_timeout_ms in the config.".to_string()
            }
            DispenseError::Rejected(RejectReason::InvalidTarget) => {
                "What happened: The requested mass was rejected.\nLikely causes: --grams is zero, negative, or above safety.max_target_g.\nHow to fix: Pass a positive --grams within the configured maximum.".to_string()
            }
            DispenseError::Rejected(RejectReason::Busy) => {
                "What happened: A dispense is already in progress.\nLikely causes: Another request started first.\nHow to fix: Wait for the current dispense to finish.".to_string()
            }
            DispenseError::Config(msg) => config_hint(msg),
            DispenseError::Aborted { delivered_g } => format!(
                "What happened: Dispense interrupted after delivering {delivered_g:.1} g; the gate was closed.\nLikely causes: Ctrl-C or a shutdown signal.\nHow to fix: Start a new dispense for the remaining amount."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open hx711") || lower.contains("open servo") || lower.contains("open button")
    {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("read config")
        || lower.contains("invalid configuration")
        || lower.contains("parse config")
    {
        return config_hint(&msg);
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn config_hint(msg: &str) -> String {
    if msg.to_ascii_lowercase().contains("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config pointing at a readable TOML file."
        );
    }
    format!(
        "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Missing [pins] (hx711_dt, hx711_sck, servo), or out-of-range values.\nHow to fix: Edit the TOML config and try again."
    )
}

/// Stable process exit codes: 2 usage or rejected target, 3 timeout, 4 sensor unavailable, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<DispenseError>() {
        Some(DispenseError::Timeout { .. }) => 3,
        Some(DispenseError::SensorUnavailable(_) | DispenseError::SensorTimeout) => 4,
        Some(DispenseError::Rejected(_)) => 2,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<DispenseError>() {
        Some(DispenseError::Timeout { .. }) => "Timeout",
        Some(DispenseError::SensorUnavailable(_) | DispenseError::SensorTimeout) => {
            "SensorUnavailable"
        }
        Some(DispenseError::Rejected(_)) => "Rejected",
        Some(DispenseError::Aborted { .. }) => "Aborted",
        Some(DispenseError::Actuator(_)) => "Actuator",
        Some(DispenseError::Transport(_)) => "Transport",
        Some(DispenseError::Hardware(_)) => "Hardware",
        Some(DispenseError::Config(_)) => "Config",
        None if err.downcast_ref::<BuildError>().is_some() => "Config",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let message = humanize(err);
    let reason = reason_name(err);
    let details = match err.downcast_ref::<DispenseError>() {
        Some(DispenseError::Timeout { delivered_g }) => Some(json!({
            "delivered_g": delivered_g,
            "max_dispense_ms": MAX_DISPENSE_MS.get(),
        })),
        Some(DispenseError::Aborted { delivered_g }) => Some(json!({ "delivered_g": delivered_g })),
        _ => None,
    };
    match details {
        Some(d) => json!({ "reason": reason, "details": d, "message": message }),
        None => json!({ "reason": reason, "message": message }),
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DispenseError::Timeout { delivered_g: 3.0 }, 3)]
    #[case(DispenseError::SensorUnavailable("offline".into()), 4)]
    #[case(DispenseError::SensorTimeout, 4)]
    #[case(DispenseError::Rejected(RejectReason::InvalidTarget), 2)]
    #[case(DispenseError::Aborted { delivered_g: 1.0 }, 1)]
    #[case(DispenseError::Transport("refused".into()), 1)]
    fn exit_codes_are_stable(#[case] e: DispenseError, #[case] code: i32) {
        assert_eq!(exit_code_for_error(&eyre::Report::new(e)), code);
    }

    #[test]
    fn wrapped_errors_keep_their_exit_code() {
        use eyre::WrapErr;
        let r: Result<(), DispenseError> = Err(DispenseError::SensorTimeout);
        let err = r.wrap_err("tare on start").unwrap_err();
        assert_eq!(exit_code_for_error(&err), 4);
    }

    #[test]
    fn timeout_json_carries_delivered_mass() {
        let err = eyre::Report::new(DispenseError::Timeout { delivered_g: 12.5 });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Timeout");
        assert_eq!(v["details"]["delivered_g"].as_f64(), Some(12.5));
        assert!(v["message"].as_str().unwrap().contains("What happened"));
    }

    #[rstest]
    #[case("invalid configuration in cfg.toml: schedule.tick_ms must be >= 1", "Configuration is invalid")]
    #[case("read config /nope.toml: No such file or directory", "could not be read")]
    fn config_errors_are_explained(#[case] msg: &str, #[case] needle: &str) {
        let err = eyre::Report::new(DispenseError::Config(msg.into()));
        assert!(humanize(&err).contains(needle));
        assert_eq!(reason_name(&err), "Config");
        assert_eq!(exit_code_for_error(&err), 1);
    }
}
