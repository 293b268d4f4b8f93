//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! session behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld    RealWorld      Compare
//!      (reference)   (Session)      Results
//! ```

use std::time::Duration;

use arbitrary::{Arbitrary, Unstructured};
use bytes::Bytes;
use proptest::prelude::*;
use whale_core::{ConnectionState, PublishStatus, Session, SessionConfig, TransportEvent};
use whale_harness::{
    ModelWorld, ObservableState, Operation, OperationResult, SimClock, model::MODEL_RESPONSE_MS,
};
use whale_proto::{PairingId, PeerId, TopicKind};

/// Real system wrapper that mirrors ModelWorld's interface.
struct RealWorld {
    session: Session,
    clock: SimClock,
}

impl RealWorld {
    fn new() -> Self {
        let config = SessionConfig {
            pairing: PairingId::new("model"),
            response_duration: Duration::from_millis(MODEL_RESPONSE_MS),
            ..SessionConfig::default()
        };
        Self { session: Session::new(config), clock: SimClock::new() }
    }

    fn inbound(&mut self, kind: TopicKind, payload: String) {
        let topic = self.session.topics().get(kind).to_string();
        let event = TransportEvent::Message { topic, payload: Bytes::from(payload) };
        self.session.handle_transport(&event, self.clock.now());
    }

    fn transport(&mut self, event: TransportEvent) {
        self.session.handle_transport(&event, self.clock.now());
    }

    fn apply(&mut self, op: &Operation) -> OperationResult {
        let now = self.clock.now();
        let wall_ms = self.clock.wall_ms();

        match op {
            Operation::Start => match self.session.start() {
                Ok(_) => OperationResult::Ok,
                Err(_) => OperationResult::Rejected,
            },
            Operation::Stop => {
                self.session.stop(wall_ms);
                OperationResult::Ok
            },
            Operation::TransportConnected => {
                self.transport(TransportEvent::Connected);
                OperationResult::Ok
            },
            Operation::TransportClosed => {
                self.transport(TransportEvent::Closed);
                OperationResult::Ok
            },
            Operation::TransportError => {
                self.transport(TransportEvent::Error { reason: "injected".into() });
                OperationResult::Ok
            },
            Operation::TransportReconnecting => {
                self.transport(TransportEvent::Reconnecting);
                OperationResult::Ok
            },
            Operation::InboundTouch { sender } => {
                self.inbound(TopicKind::Touch, format!("{sender}:touch:{wall_ms}"));
                OperationResult::Ok
            },
            Operation::InboundColor(color) => {
                self.inbound(TopicKind::Color, color.encode());
                OperationResult::Ok
            },
            Operation::InboundPattern(pattern) => {
                self.inbound(TopicKind::Pattern, pattern.as_str().to_string());
                OperationResult::Ok
            },
            Operation::InboundGarbageColor => {
                self.inbound(TopicKind::Color, "12,abc,7".to_string());
                OperationResult::Ok
            },
            Operation::RequestTouch { peer } => {
                OperationResult::Published(self.session.request_touch(*peer, now, wall_ms).status)
            },
            Operation::SetColor(color) => {
                OperationResult::Published(self.session.set_color(*color).status)
            },
            Operation::SetPattern(pattern) => {
                OperationResult::Published(self.session.set_pattern(*pattern).status)
            },
            Operation::Heartbeat => {
                OperationResult::Published(self.session.send_heartbeat(wall_ms).status)
            },
            Operation::SyncAll => OperationResult::Published(self.session.sync_all().status),
            Operation::TurnOff => OperationResult::Published(self.session.turn_off().status),
            Operation::AdvanceTime { millis } => {
                self.clock.advance(Duration::from_millis(u64::from(*millis)));
                self.session.poll_expired(self.clock.now());
                OperationResult::Ok
            },
        }
    }

    fn observable_state(&self) -> ObservableState {
        let snapshot = self.session.snapshot();
        ObservableState {
            connection: snapshot.connection,
            color: snapshot.color,
            pattern: snapshot.pattern,
            responding: snapshot.responding,
        }
    }
}

/// Operations generated through `arbitrary`, the same path the fuzz target
/// uses.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop::collection::vec(any::<u8>(), 16..64).prop_filter_map("arbitrary input", |bytes| {
        Operation::arbitrary(&mut Unstructured::new(&bytes)).ok()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Model and real session agree after every operation.
    #[test]
    fn prop_session_matches_model(ops in prop::collection::vec(operation_strategy(), 0..60)) {
        let mut model = ModelWorld::new();
        let mut real = RealWorld::new();

        for op in &ops {
            let model_result = model.apply(op);
            let real_result = real.apply(op);

            prop_assert_eq!(model_result, real_result, "result mismatch for {:?}", op);
            prop_assert_eq!(
                model.observable_state(),
                real.observable_state(),
                "state mismatch after {:?}",
                op
            );
        }
    }

    /// A touch from one peer never makes the sender respond.
    #[test]
    fn prop_sender_never_responds_to_own_touch(sender_first in any::<bool>()) {
        let sender = if sender_first { PeerId::Whale1 } else { PeerId::Whale2 };
        let mut model = ModelWorld::new();
        let mut real = RealWorld::new();

        for op in [
            Operation::Start,
            Operation::TransportConnected,
            Operation::InboundTouch { sender },
        ] {
            model.apply(&op);
            real.apply(&op);
        }

        let state = real.observable_state();
        prop_assert!(!state.responding[sender.index()]);
        prop_assert!(state.responding[sender.other().index()]);
    }

    /// Every outbound operation is Offline unless connected.
    #[test]
    fn prop_offline_unless_connected(ops in prop::collection::vec(operation_strategy(), 0..30)) {
        let mut real = RealWorld::new();
        for op in &ops {
            let connected = real.observable_state().connection == ConnectionState::Connected;
            if let OperationResult::Published(status) = real.apply(op) {
                prop_assert_eq!(status == PublishStatus::Sent, connected);
            }
        }
    }
}

#[cfg(test)]
mod smoke_tests {
    use super::*;

    #[test]
    fn refresh_keeps_window_open() {
        let mut model = ModelWorld::new();
        let mut real = RealWorld::new();

        let ops = [
            Operation::Start,
            Operation::TransportConnected,
            Operation::InboundTouch { sender: PeerId::Whale1 },
            Operation::AdvanceTime { millis: 1000 },
            Operation::InboundTouch { sender: PeerId::Whale1 },
            Operation::AdvanceTime { millis: 4000 },
        ];
        for op in &ops {
            model.apply(op);
            real.apply(op);
        }

        assert_eq!(model.observable_state().responding, [false, true]);
        assert_eq!(real.observable_state().responding, [false, true]);

        model.apply(&Operation::AdvanceTime { millis: 1000 });
        real.apply(&Operation::AdvanceTime { millis: 1000 });
        assert_eq!(real.observable_state().responding, [false, false]);
        assert_eq!(model.observable_state(), real.observable_state());
    }
}
