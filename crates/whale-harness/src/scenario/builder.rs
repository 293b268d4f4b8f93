//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::time::Duration;

use bytes::Bytes;
use whale_core::{Session, SessionConfig, TransportEvent};
use whale_proto::{PairingId, Pattern, PeerId, Rgb, TopicKind};

use crate::{
    model::Operation,
    scenario::{OracleFn, World},
    sim_env::SimClock,
};

/// One scripted step.
#[derive(Debug, Clone)]
pub enum Step {
    /// Start connecting
    Start,
    /// Stop and release the transport
    Stop,
    /// Deliver a transport lifecycle event
    Transport(TransportEvent),
    /// Deliver a message on the pair's topic of `kind`
    Inbound {
        /// Topic kind
        kind: TopicKind,
        /// Raw payload
        payload: String,
    },
    /// Control surface touch
    Touch(PeerId),
    /// Control surface color
    SetColor(Rgb),
    /// Control surface pattern
    SetPattern(Pattern),
    /// Online heartbeat
    Heartbeat,
    /// Republish color and pattern
    SyncAll,
    /// Pattern `off`
    TurnOff,
    /// Advance virtual time and fire due expiries
    Advance(Duration),
}

impl Step {
    /// Inbound message step.
    pub fn inbound(kind: TopicKind, payload: impl Into<String>) -> Self {
        Self::Inbound { kind, payload: payload.into() }
    }

    /// Advance by `ms` milliseconds.
    pub fn advance_ms(ms: u64) -> Self {
        Self::Advance(Duration::from_millis(ms))
    }
}

impl From<&Operation> for Step {
    /// Script a generated operation. Inbound touches carry timestamp 0.
    fn from(op: &Operation) -> Self {
        match op {
            Operation::Start => Self::Start,
            Operation::Stop => Self::Stop,
            Operation::TransportConnected => Self::Transport(TransportEvent::Connected),
            Operation::TransportClosed => Self::Transport(TransportEvent::Closed),
            Operation::TransportError => {
                Self::Transport(TransportEvent::Error { reason: "injected".into() })
            },
            Operation::TransportReconnecting => Self::Transport(TransportEvent::Reconnecting),
            Operation::InboundTouch { sender } => {
                Self::inbound(TopicKind::Touch, format!("{sender}:touch:0"))
            },
            Operation::InboundColor(color) => Self::inbound(TopicKind::Color, color.encode()),
            Operation::InboundPattern(pattern) => Self::inbound(TopicKind::Pattern, pattern.as_str()),
            Operation::InboundGarbageColor => Self::inbound(TopicKind::Color, "12,abc,7"),
            Operation::RequestTouch { peer } => Self::Touch(*peer),
            Operation::SetColor(color) => Self::SetColor(*color),
            Operation::SetPattern(pattern) => Self::SetPattern(*pattern),
            Operation::Heartbeat => Self::Heartbeat,
            Operation::SyncAll => Self::SyncAll,
            Operation::TurnOff => Self::TurnOff,
            Operation::AdvanceTime { millis } => Self::advance_ms(u64::from(*millis)),
        }
    }
}

/// Scenario builder.
///
/// Must call `.oracle()` to get a [`RunnableScenario`] that can be executed.
pub struct Scenario {
    name: String,
    config: SessionConfig,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with the given name and default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), config: SessionConfig::default(), steps: Vec::new() }
    }

    /// Use `pairing` as the pair namespace.
    pub fn pairing(mut self, pairing: impl Into<String>) -> Self {
        self.config.pairing = PairingId::new(pairing);
        self
    }

    /// Replace the whole session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Shorthand for start plus a successful connection.
    pub fn connected(self) -> Self {
        self.step(Step::Start).step(Step::Transport(TransportEvent::Connected))
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute every step in order, then run the oracle on the final world.
    pub fn run(self) -> Result<(), String> {
        let Scenario { name, config, steps } = self.scenario;
        let mut world = World::new(Session::new(config), SimClock::new());

        for (index, step) in steps.into_iter().enumerate() {
            world
                .apply(step)
                .map_err(|e| format!("Scenario '{name}': step {index} failed: {e}"))?;
        }

        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}

impl World {
    /// Run one step and execute the actions it produces.
    ///
    /// Only a rejected `Start` fails; the world is left unchanged then.
    pub fn apply(&mut self, step: Step) -> Result<(), String> {
        apply(self, step)
    }
}

fn apply(world: &mut World, step: Step) -> Result<(), String> {
    let now = world.clock().now();
    let wall_ms = world.clock().wall_ms();

    let actions = match step {
        Step::Start => world.session_mut().start().map_err(|e| e.to_string())?,
        Step::Stop => world.session_mut().stop(wall_ms),
        Step::Transport(event) => {
            let mut actions = world.session_mut().handle_transport(&event, now);
            if actions.iter().any(|a| matches!(a, whale_core::SessionAction::Subscribe(_))) {
                actions.extend(world.session_mut().subscribe_result(&Ok(())));
            }
            actions
        },
        Step::Inbound { kind, payload } => {
            let topic = world.session().topics().get(kind).to_string();
            let event = TransportEvent::Message { topic, payload: Bytes::from(payload) };
            world.session_mut().handle_transport(&event, now)
        },
        Step::Touch(peer) => world.session_mut().request_touch(peer, now, wall_ms).actions,
        Step::SetColor(color) => world.session_mut().set_color(color).actions,
        Step::SetPattern(pattern) => world.session_mut().set_pattern(pattern).actions,
        Step::Heartbeat => world.session_mut().send_heartbeat(wall_ms).actions,
        Step::SyncAll => world.session_mut().sync_all().actions,
        Step::TurnOff => world.session_mut().turn_off().actions,
        Step::Advance(by) => {
            world.clock().advance(by);
            world.fire_due_timers();
            Vec::new()
        },
    };

    world.execute(actions);
    Ok(())
}
