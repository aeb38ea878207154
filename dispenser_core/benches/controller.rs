use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use dispenser_core::DispenseController;
use dispenser_core::mocks::RecordingGate;

// Falling hopper weight with a little deterministic jitter.
fn synth_weights(n: usize, start_g: f32, step_g: f32) -> Vec<f32> {
    let mut state: u32 = 0x9e37_79b9;
    (0..n)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let jitter = (state as f32 / u32::MAX as f32 - 0.5) * 0.4;
            start_g - step_g * i as f32 + jitter
        })
        .collect()
}

pub fn bench_tick(c: &mut Criterion) {
    let weights = synth_weights(2_000, 5_000.0, 0.5);
    c.bench_function("controller_sample_and_tick_2k", |b| {
        b.iter_batched(
            || {
                DispenseController::builder()
                    .with_gate(RecordingGate::new())
                    .build()
                    .unwrap()
            },
            |mut ctl| {
                ctl.on_weight_sample(5_000.0);
                ctl.start_dispensing(black_box(900.0));
                for &w in &weights {
                    ctl.on_weight_sample(w);
                    if ctl.on_tick().is_terminal() {
                        ctl.start_dispensing(900.0);
                    }
                }
                black_box(ctl.take_events().count())
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
