use dispenser_core::mocks::{ManualClock, RecordingGate};
use dispenser_core::{DispenseController, DispenseState, SafetyCfg, StartOutcome, TickOutcome};
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Sample(f32),
    Start(f32),
    Tick,
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-50.0f32..2000.0).prop_map(Op::Sample),
        1 => (-10.0f32..600.0).prop_map(Op::Start),
        4 => Just(Op::Tick),
        1 => (0u64..2000).prop_map(Op::Advance),
    ]
}

proptest! {
    #[test]
    fn delivered_mass_is_never_negative(ops in prop::collection::vec(op_strategy(), 1..300)) {
        let clock = ManualClock::new();
        let gate = RecordingGate::new();
        let mut ctl = DispenseController::builder()
            .with_gate(gate.clone())
            .with_safety(SafetyCfg { max_dispense_ms: 5000, max_target_g: 500.0 })
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();

        for op in ops {
            match op {
                Op::Sample(g) => ctl.on_weight_sample(g),
                Op::Start(t) => {
                    let was_idle = ctl.is_idle();
                    let before = ctl.session().copied();
                    let out = ctl.start_dispensing(t);
                    if !was_idle {
                        // An active session is never replaced.
                        prop_assert!(matches!(out, StartOutcome::Rejected(_)));
                        prop_assert_eq!(ctl.session().map(|s| s.target_g), before.map(|s| s.target_g));
                    }
                }
                Op::Tick => {
                    let out = ctl.on_tick();
                    if out.is_terminal() {
                        prop_assert_eq!(ctl.state(), DispenseState::Idle);
                        prop_assert_eq!(gate.is_open(), Some(false));
                    }
                    if let TickOutcome::Dispensing { delivered_g } = out {
                        prop_assert!(delivered_g >= 0.0);
                    }
                }
                Op::Advance(ms) => clock.advance_ms(ms),
            }
            prop_assert!(ctl.delivered_mass() >= 0.0);
            prop_assert!(ctl.current_weight() >= 0.0);
            if ctl.is_idle() {
                prop_assert_eq!(ctl.delivered_mass(), 0.0);
            }
        }
    }
}
