use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use dispenser_hardware::error::HwError;
use dispenser_hardware::util::wait_for_ready;

#[test]
fn wait_for_ready_success_path() {
    let ready = Arc::new(AtomicBool::new(false));
    let ready_bg = ready.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        ready_bg.store(true, Ordering::Relaxed);
    });

    let res = wait_for_ready(
        || ready.load(Ordering::Relaxed),
        Duration::from_millis(500),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_for_ready_returns_immediately_when_ready() {
    let waited = wait_for_ready(|| true, Duration::from_millis(5), Duration::from_millis(1))
        .expect("ready");
    assert!(waited < Duration::from_millis(5));
}

#[test]
fn wait_for_ready_timeout_path() {
    let err = wait_for_ready(
        || false,
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");

    match err {
        HwError::DataReadyTimeout => {}
        other => panic!("unexpected error: {other:?}"),
    }
}
