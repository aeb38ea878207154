use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

const CFG: &str = r#"
[pins]
hx711_dt = 5
hx711_sck = 6
servo = 18

[sensor]
average_samples = 1

[calibration]
gain_g_per_count = 0.01

[schedule]
sample_ms = 5
tick_ms = 5
flush_ms = 5
telemetry_ms = 0
loop_ms = 2
"#;

#[rstest]
fn stuck_sensor_times_out_with_exit_3() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(&path, CFG).unwrap();

    let mut cmd = Command::cargo_bin("dispenser").unwrap();
    cmd.arg("--config")
        .arg(&path)
        .arg("dispense")
        .arg("--grams")
        .arg("20")
        .arg("--max-dispense-ms")
        .arg("100")
        .env("DISPENSER_TEST_SIM_STUCK", "1");

    cmd.assert()
        .code(3)
        .stderr(predicate::str::contains("timed out"))
        .stdout(predicate::str::contains("dispense complete").not());
}

#[rstest]
fn timeout_json_error_carries_limit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(&path, CFG).unwrap();

    let mut cmd = Command::cargo_bin("dispenser").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&path)
        .arg("dispense")
        .arg("--grams")
        .arg("20")
        .arg("--max-dispense-ms")
        .arg("100")
        .env("DISPENSER_TEST_SIM_STUCK", "1");

    let out = cmd.assert().code(3).get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(lines.len(), 1, "expected one JSON document; stdout was: {stdout}");
    let v: serde_json::Value = serde_json::from_str(lines[0]).expect("valid JSON");
    assert!(v.get("outcome").is_none(), "no success summary on timeout");
    assert_eq!(v["reason"], "Timeout");
    assert_eq!(v["details"]["max_dispense_ms"].as_u64(), Some(100));
    assert_eq!(v["details"]["delivered_g"].as_f64(), Some(0.0));
}
