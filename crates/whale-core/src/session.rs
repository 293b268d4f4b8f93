//! Session aggregate.
//!
//! One [`Session`] owns every piece of mutable pairing state: the connection
//! lifecycle, the shared color and pattern, and the response windows. It is
//! built once at startup and driven by a single owner, which makes each call
//! an atomic step whose result is visible through [`Session::snapshot`].

use std::time::{Duration, Instant};

use tracing::debug;
use whale_proto::{HeartbeatStatus, PairingId, Pattern, PeerId, Rgb, TopicSet};

use crate::{
    action::SessionAction,
    connection::{Connection, ConnectionState},
    coordinator::{Coordinator, Outcome, SessionStats},
    error::{ConnectionError, TransportError},
    scheduler::TimerId,
    transport::{ConnectOptions, TransportEvent},
};

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Pair namespace for topics
    pub pairing: PairingId,
    /// Transport options
    pub connect: ConnectOptions,
    /// How long a peer keeps responding after a touch
    pub response_duration: Duration,
    /// Device name announced in heartbeats
    pub device_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pairing: PairingId::new("whale_pair_jeff_friend"),
            connect: ConnectOptions::default(),
            response_duration: Duration::from_millis(5000),
            device_name: "web_panel".to_string(),
        }
    }
}

/// Immutable view of a session after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Connection state
    pub connection: ConnectionState,
    /// Shared color
    pub color: Rgb,
    /// Shared pattern
    pub pattern: Pattern,
    /// Responding flag per peer, indexed by [`PeerId::index`]
    pub responding: [bool; 2],
    /// Counters
    pub stats: SessionStats,
}

impl Snapshot {
    /// Whether `peer` was responding when the snapshot was taken.
    pub fn is_responding(&self, peer: PeerId) -> bool {
        self.responding[peer.index()]
    }
}

/// All pairing state for one control surface.
#[derive(Debug, Clone)]
pub struct Session {
    connection: Connection,
    coordinator: Coordinator,
}

impl Session {
    /// Build a session in `Idle` state.
    pub fn new(config: SessionConfig) -> Self {
        let topics = TopicSet::derive(&config.pairing);
        Self {
            connection: Connection::new(config.connect, &topics),
            coordinator: Coordinator::new(topics, config.response_duration, config.device_name),
        }
    }

    /// Connection lifecycle.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Pairing coordinator.
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Topics of this pair.
    pub fn topics(&self) -> &TopicSet {
        self.coordinator.topics()
    }

    /// Start connecting.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the session is `Idle`.
    pub fn start(&mut self) -> Result<Vec<SessionAction>, ConnectionError> {
        Ok(into_actions(self.connection.start()?))
    }

    /// Stop and release the transport.
    ///
    /// When connected, an offline heartbeat goes out before the disconnect.
    /// Response windows are left running.
    pub fn stop(&mut self, wall_ms: u64) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        if self.connection.is_connected() {
            actions.extend(
                self.coordinator
                    .heartbeat(&self.connection, HeartbeatStatus::Offline, wall_ms)
                    .actions,
            );
        }
        actions.extend(into_actions(self.connection.stop()));
        actions
    }

    /// Stop and cancel every pending expiry. Nothing fires afterwards.
    pub fn shutdown(&mut self, wall_ms: u64) -> Vec<SessionAction> {
        let mut actions = self.stop(wall_ms);
        actions.extend(self.coordinator.cancel_timers());
        actions
    }

    /// Feed one transport event.
    pub fn handle_transport(&mut self, event: &TransportEvent, now: Instant) -> Vec<SessionAction> {
        match event {
            TransportEvent::Message { topic, payload } => {
                if self.connection.is_connected() {
                    self.coordinator.handle_inbound(topic, payload, now)
                } else {
                    debug!(%topic, state = ?self.connection.state(), "dropping message while not connected");
                    Vec::new()
                }
            },
            _ => into_actions(self.connection.handle_event(event)),
        }
    }

    /// The transport handle was lost before or after connecting.
    ///
    /// The driver must have dropped its handle already. A retry is requested
    /// through [`SessionAction::ScheduleRetry`].
    pub fn transport_lost(&mut self, reason: &str) -> Vec<SessionAction> {
        into_actions(self.connection.transport_lost(reason))
    }

    /// Scheduled retry fired. Stale retries produce no actions.
    pub fn retry(&mut self) -> Vec<SessionAction> {
        into_actions(self.connection.retry())
    }

    /// Feed the result of the batched subscribe.
    pub fn subscribe_result(&mut self, result: &Result<(), TransportError>) -> Vec<SessionAction> {
        into_actions(self.connection.subscribe_result(result))
    }

    /// Touch `peer` from the control surface.
    pub fn request_touch(&mut self, peer: PeerId, now: Instant, wall_ms: u64) -> Outcome {
        self.coordinator.request_touch(&self.connection, peer, now, wall_ms)
    }

    /// Replace the shared color.
    pub fn set_color(&mut self, color: Rgb) -> Outcome {
        self.coordinator.set_color(&self.connection, color)
    }

    /// Replace the shared pattern.
    pub fn set_pattern(&mut self, pattern: Pattern) -> Outcome {
        self.coordinator.set_pattern(&self.connection, pattern)
    }

    /// Publish an online heartbeat.
    pub fn send_heartbeat(&mut self, wall_ms: u64) -> Outcome {
        self.coordinator.send_heartbeat(&self.connection, wall_ms)
    }

    /// Republish color and pattern.
    pub fn sync_all(&mut self) -> Outcome {
        self.coordinator.sync_all(&self.connection)
    }

    /// Set the `off` pattern everywhere.
    pub fn turn_off(&mut self) -> Outcome {
        self.coordinator.turn_off(&self.connection)
    }

    /// Expiry callback for `timer`.
    pub fn expire(&mut self, peer: PeerId, timer: TimerId) -> Vec<SessionAction> {
        self.coordinator.expire(peer, timer)
    }

    /// Close windows due at `now`.
    pub fn poll_expired(&mut self, now: Instant) -> Vec<SessionAction> {
        self.coordinator.poll_expired(now)
    }

    /// Current state as one value.
    pub fn snapshot(&self) -> Snapshot {
        let stats = SessionStats { reconnects: self.connection.reconnects(), ..self.coordinator.stats() };
        Snapshot {
            connection: self.connection.state(),
            color: self.coordinator.color(),
            pattern: self.coordinator.pattern(),
            responding: PeerId::ALL.map(|peer| self.coordinator.is_responding(peer)),
            stats,
        }
    }
}

fn into_actions<A: Into<SessionAction>>(actions: Vec<A>) -> Vec<SessionAction> {
    actions.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn session() -> Session {
        Session::new(SessionConfig {
            pairing: PairingId::new("demo"),
            ..SessionConfig::default()
        })
    }

    fn online() -> Session {
        let mut session = session();
        session.start().unwrap();
        session.handle_transport(&TransportEvent::Connected, Instant::now());
        session
    }

    #[test]
    fn initial_snapshot() {
        let snapshot = session().snapshot();
        assert_eq!(snapshot.connection, ConnectionState::Idle);
        assert_eq!(snapshot.color, Rgb::new(255, 100, 200));
        assert_eq!(snapshot.pattern, Pattern::Pulse);
        assert_eq!(snapshot.responding, [false, false]);
        assert_eq!(snapshot.stats, SessionStats::default());
    }

    #[test]
    fn messages_before_connected_are_dropped() {
        let mut session = session();
        session.start().unwrap();

        let actions = session.handle_transport(
            &TransportEvent::Message {
                topic: "pico_whale/demo/color".into(),
                payload: Bytes::from_static(b"1,2,3"),
            },
            Instant::now(),
        );

        assert!(actions.is_empty());
        assert_eq!(session.snapshot().color, Rgb::DEFAULT_TOUCH);
    }

    #[test]
    fn stop_while_connected_sends_offline_heartbeat_first() {
        let mut session = online();

        let actions = session.stop(42);

        match &actions[0] {
            SessionAction::Publish { topic, payload } => {
                assert_eq!(topic, "pico_whale/demo/heartbeat");
                assert_eq!(payload, r#"{"device":"web_panel","status":"offline","timestamp":42}"#);
            },
            other => panic!("expected heartbeat publish, got {other:?}"),
        }
        assert_eq!(actions[1], SessionAction::Disconnect);
        assert_eq!(session.snapshot().connection, ConnectionState::Idle);
    }

    #[test]
    fn stop_while_disconnected_skips_heartbeat() {
        let mut session = online();
        session.handle_transport(&TransportEvent::Closed, Instant::now());

        let actions = session.stop(0);
        assert_eq!(actions[0], SessionAction::Disconnect);
        assert!(!actions.iter().any(|a| matches!(a, SessionAction::Publish { .. })));
    }

    #[test]
    fn shutdown_cancels_pending_expiries() {
        let mut session = session();
        session.request_touch(PeerId::Whale1, Instant::now(), 0);
        assert!(session.snapshot().is_responding(PeerId::Whale2));

        let actions = session.shutdown(0);

        assert!(actions.iter().any(|a| matches!(a, SessionAction::CancelExpiry { .. })));
        assert_eq!(session.snapshot().responding, [false, false]);
    }

    #[test]
    fn lost_transport_retries_into_connecting() {
        let mut session = online();

        let actions = session.transport_lost("handle finished");
        assert_eq!(session.snapshot().connection, ConnectionState::Disconnected);
        assert!(actions.contains(&SessionAction::ScheduleRetry(Duration::from_secs(5))));

        let actions = session.retry();
        assert!(matches!(actions[0], SessionAction::Open(_)));
        assert_eq!(session.snapshot().connection, ConnectionState::Connecting);
        assert_eq!(session.snapshot().stats.reconnects, 1);
    }

    #[test]
    fn snapshot_counts_reconnects() {
        let mut session = online();
        let now = Instant::now();
        session.handle_transport(&TransportEvent::Closed, now);
        session.handle_transport(&TransportEvent::Reconnecting, now);

        assert_eq!(session.snapshot().stats.reconnects, 1);
        assert_eq!(session.snapshot().connection, ConnectionState::Connecting);
    }
}
