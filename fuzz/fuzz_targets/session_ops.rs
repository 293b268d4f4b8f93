//! Drive a session with arbitrary operation sequences.
//!
//! After every step the session must agree with the reference model, and
//! the pending expiry timers must match the responding peers one to one.

#![no_main]

use libfuzzer_sys::fuzz_target;
use whale_core::{ConnectionState, Session, SessionConfig};
use whale_harness::{
    ModelWorld, Operation, SimClock,
    model::MODEL_RESPONSE_MS,
    scenario::{Step, World},
};

fuzz_target!(|ops: Vec<Operation>| {
    let config = SessionConfig {
        response_duration: std::time::Duration::from_millis(MODEL_RESPONSE_MS),
        ..SessionConfig::default()
    };
    let mut world = World::new(Session::new(config), SimClock::new());
    let mut model = ModelWorld::new();

    for op in &ops {
        let accepted = model.apply(op).is_ok();
        assert_eq!(world.apply(Step::from(op)).is_ok(), accepted, "{op:?}");

        let snapshot = world.snapshot();
        let expected = model.observable_state();
        assert_eq!(snapshot.connection, expected.connection, "{op:?}");
        assert_eq!(snapshot.color, expected.color, "{op:?}");
        assert_eq!(snapshot.pattern, expected.pattern, "{op:?}");
        assert_eq!(snapshot.responding, expected.responding, "{op:?}");

        let responding = snapshot.responding.iter().filter(|r| **r).count();
        assert_eq!(world.pending_timers(), responding);

        if snapshot.connection == ConnectionState::Idle {
            assert_eq!(world.opens(), world.disconnects());
        }
    }
});
