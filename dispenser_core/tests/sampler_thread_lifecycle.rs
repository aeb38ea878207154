//! Sampler thread lifecycle: the thread publishes samples and always exits on drop.

use dispenser_core::mocks::SeqScale;
use dispenser_core::sampler::Sampler;
use dispenser_core::{Calibration, LoadCellAdapter, SensorCfg};
use dispenser_hardware::SimulatedHopper;
use dispenser_traits::MonotonicClock;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn unit_cal() -> Calibration {
    Calibration {
        gain_g_per_count: 1.0,
        zero_counts: 0,
        offset_g: 0.0,
    }
}

fn one_read() -> SensorCfg {
    SensorCfg {
        average_samples: 1,
        read_timeout_ms: 10,
    }
}

#[test]
fn publishes_calibrated_samples() {
    let hopper = SimulatedHopper::new(123.0, 1.0, 0);
    let adapter = LoadCellAdapter::new(hopper.scale(), unit_cal(), one_read());
    let sampler = Sampler::spawn(adapter, Duration::from_millis(5), Arc::new(MonotonicClock::new()));
    let g = sampler
        .wait_for_sample(Duration::from_secs(2))
        .expect("sample within 2 s");
    assert_eq!(g, 123.0);
}

#[test]
fn thread_exits_promptly_on_drop_even_with_long_period() {
    let adapter = LoadCellAdapter::new(SeqScale::new([1, 2, 3]), unit_cal(), one_read());
    let sampler = Sampler::spawn(adapter, Duration::from_secs(60), Arc::new(MonotonicClock::new()));
    std::thread::sleep(Duration::from_millis(20));
    let t0 = Instant::now();
    drop(sampler);
    assert!(t0.elapsed() < Duration::from_secs(5), "drop blocked on the period sleep");
}

#[test]
fn failing_sensor_is_counted_and_never_published() {
    let hopper = SimulatedHopper::new(10.0, 1.0, 0);
    hopper.set_sensor_offline(true);
    let adapter = LoadCellAdapter::new(hopper.scale(), unit_cal(), one_read());
    let sampler = Sampler::spawn(adapter, Duration::from_millis(2), Arc::new(MonotonicClock::new()));
    std::thread::sleep(Duration::from_millis(50));
    assert!(sampler.latest().is_none());
    assert!(sampler.failures() > 0);
}

#[test]
fn many_samplers_do_not_leak_threads() {
    for _ in 0..10 {
        let adapter = LoadCellAdapter::new(SeqScale::new(0..100), unit_cal(), one_read());
        let sampler = Sampler::spawn(adapter, Duration::from_millis(1), Arc::new(MonotonicClock::new()));
        std::thread::sleep(Duration::from_millis(5));
        let _ = sampler.latest();
        drop(sampler);
    }
}
