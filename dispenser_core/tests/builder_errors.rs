use dispenser_core::error::BuildError;
use dispenser_core::mocks::RecordingGate;
use dispenser_core::{DispenseController, EventsCfg, SafetyCfg};
use rstest::rstest;

fn invalid_config_message(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(msg)) => *msg,
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}

#[rstest]
fn defaults_build() {
    let ctl = DispenseController::builder()
        .with_gate(RecordingGate::new())
        .build()
        .expect("defaults are valid");
    assert_eq!(ctl.device_id(), "ESP32_001");
    assert!(ctl.is_idle());
}

#[rstest]
#[case("")]
#[case("   ")]
fn empty_device_id_is_rejected(#[case] id: &str) {
    let err = DispenseController::builder()
        .with_gate(RecordingGate::new())
        .with_device_id(id)
        .try_build()
        .expect_err("empty device id");
    assert!(invalid_config_message(&err).contains("device_id"));
}

#[rstest]
#[case(0.0)]
#[case(-1.0)]
#[case(f32::NAN)]
fn non_positive_max_target_is_rejected(#[case] max_target_g: f32) {
    let err = DispenseController::builder()
        .with_gate(RecordingGate::new())
        .with_safety(SafetyCfg {
            max_target_g,
            ..SafetyCfg::default()
        })
        .try_build()
        .expect_err("bad max target");
    assert!(invalid_config_message(&err).contains("max_target_g"));
}

#[rstest]
fn zero_outbox_is_rejected() {
    let err = DispenseController::builder()
        .with_events(EventsCfg { max_pending: 0 })
        .with_gate(RecordingGate::new())
        .build()
        .expect_err("zero outbox");
    assert!(invalid_config_message(&err).contains("max_pending"));
}
