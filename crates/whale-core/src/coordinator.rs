//! Pairing coordinator.
//!
//! Applies the pairing rule to inbound messages and turns user intents into
//! publishes. Owns the shared color and pattern and the response scheduler.
//!
//! # Pairing Rule
//!
//! A touch from one whale makes the *other* whale respond. The sender never
//! responds to its own touch. The control surface does not short-circuit
//! this when online: its touch is published, the broker echoes it back, and
//! the echo opens the window like any other inbound touch.
//!
//! # Offline Behavior
//!
//! Every outbound operation reports a [`PublishStatus`]. When the connection
//! is down nothing is queued: local state still changes and touches are
//! simulated by opening the window directly.

use std::time::{Duration, Instant};

use tracing::{debug, info};
use whale_proto::{
    Heartbeat, HeartbeatStatus, Message, Pattern, PeerId, Rgb, TopicKind, TopicSet, Touch,
};

use crate::{
    action::SessionAction,
    connection::Connection,
    notice::Notice,
    scheduler::{ResponseScheduler, TimerId},
};

/// Result of an outbound operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    /// Handed to the transport
    Sent,
    /// Not connected, nothing was published
    Offline,
}

impl PublishStatus {
    /// True when the message was handed to the transport.
    pub fn is_sent(self) -> bool {
        self == Self::Sent
    }
}

/// Publish status plus the actions produced on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Whether anything was published
    pub status: PublishStatus,
    /// Actions for the driver
    pub actions: Vec<SessionAction>,
}

/// Counters shown on the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Touches published by this session
    pub touches_sent: u64,
    /// Touches received from the broker, echoes included
    pub touches_received: u64,
    /// Automatic reconnect attempts reported by the transport
    pub reconnects: u64,
}

/// Pairing coordinator state.
#[derive(Debug, Clone)]
pub struct Coordinator {
    topics: TopicSet,
    response_duration: Duration,
    device_name: String,
    color: Rgb,
    pattern: Pattern,
    scheduler: ResponseScheduler,
    touches_sent: u64,
    touches_received: u64,
}

impl Coordinator {
    /// Coordinator with initial color and pattern.
    pub fn new(topics: TopicSet, response_duration: Duration, device_name: String) -> Self {
        Self {
            topics,
            response_duration,
            device_name,
            color: Rgb::DEFAULT_TOUCH,
            pattern: Pattern::default(),
            scheduler: ResponseScheduler::new(),
            touches_sent: 0,
            touches_received: 0,
        }
    }

    /// Current shared color.
    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Current shared pattern.
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Topics this coordinator publishes on.
    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    /// Response windows.
    pub fn scheduler(&self) -> &ResponseScheduler {
        &self.scheduler
    }

    /// Whether `peer` is responding right now.
    pub fn is_responding(&self, peer: PeerId) -> bool {
        self.scheduler.is_responding(peer)
    }

    /// Touch counters. `reconnects` is left at zero; the connection owns it.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            touches_sent: self.touches_sent,
            touches_received: self.touches_received,
            reconnects: 0,
        }
    }

    /// Apply a message received on `topic`.
    ///
    /// Topics outside the pair and payloads that fail to decode are dropped.
    pub fn handle_inbound(
        &mut self,
        topic: &str,
        payload: &[u8],
        now: Instant,
    ) -> Vec<SessionAction> {
        let Some(kind) = self.topics.classify(topic) else {
            debug!(%topic, "ignoring message on foreign topic");
            return Vec::new();
        };

        let message = match Message::decode(kind, payload) {
            Ok(message) => message,
            Err(e) => {
                debug!(%topic, error = %e, "dropping malformed payload");
                return vec![SessionAction::Notice(Notice::warning(format!(
                    "Ignored {kind} message: {e}"
                )))];
            },
        };

        match message {
            Message::Touch(touch) => self.on_touch(touch, now),
            Message::Color(color) => {
                self.color = color;
                vec![
                    SessionAction::ColorChanged(color),
                    SessionAction::Notice(Notice::info(format!("Color changed to {color}"))),
                ]
            },
            Message::Pattern(pattern) => {
                self.pattern = pattern;
                vec![
                    SessionAction::PatternChanged(pattern),
                    SessionAction::Notice(Notice::info(format!("Pattern changed to {pattern}"))),
                ]
            },
            Message::Heartbeat(heartbeat) => {
                vec![SessionAction::Notice(Notice::info(format!(
                    "Heartbeat from {}: {}",
                    heartbeat.device,
                    heartbeat.status.as_str()
                )))]
            },
            Message::Status(text) => {
                vec![SessionAction::Notice(Notice::info(format!("Status: {text}")))]
            },
        }
    }

    fn on_touch(&mut self, touch: Touch, now: Instant) -> Vec<SessionAction> {
        self.touches_received += 1;
        let responder = touch.sender.other();
        info!(sender = %touch.sender, %responder, "touch received");

        let mut actions = vec![SessionAction::Notice(Notice::info(format!(
            "{} touched, {} responding",
            touch.sender, responder
        )))];
        actions.extend(self.trigger(responder, now));
        actions
    }

    /// Touch `peer` from the control surface.
    ///
    /// Online this only publishes; the broker's echo opens the window.
    /// Offline the other peer's window opens locally.
    pub fn request_touch(
        &mut self,
        connection: &Connection,
        peer: PeerId,
        now: Instant,
        wall_ms: u64,
    ) -> Outcome {
        let touch = Touch::new(peer, wall_ms);
        match self.publish(connection, &Message::Touch(touch)) {
            Some(publish) => {
                self.touches_sent += 1;
                Outcome {
                    status: PublishStatus::Sent,
                    actions: vec![
                        publish,
                        SessionAction::Notice(Notice::success(format!("Sent touch as {peer}"))),
                    ],
                }
            },
            None => {
                let mut actions = vec![SessionAction::Notice(Notice::warning(format!(
                    "Offline, simulating touch on {peer}"
                )))];
                actions.extend(self.trigger(peer.other(), now));
                Outcome { status: PublishStatus::Offline, actions }
            },
        }
    }

    /// Replace the shared color, publishing it when connected.
    pub fn set_color(&mut self, connection: &Connection, color: Rgb) -> Outcome {
        self.color = color;
        let mut actions = vec![SessionAction::ColorChanged(color)];
        let status = self.publish_into(connection, &Message::Color(color), &mut actions);
        Outcome { status, actions }
    }

    /// Replace the shared pattern, publishing it when connected.
    pub fn set_pattern(&mut self, connection: &Connection, pattern: Pattern) -> Outcome {
        self.pattern = pattern;
        let mut actions = vec![SessionAction::PatternChanged(pattern)];
        let status = self.publish_into(connection, &Message::Pattern(pattern), &mut actions);
        Outcome { status, actions }
    }

    /// Publish an online heartbeat. A no-op when offline.
    pub fn send_heartbeat(&mut self, connection: &Connection, wall_ms: u64) -> Outcome {
        self.heartbeat(connection, HeartbeatStatus::Online, wall_ms)
    }

    /// Publish a heartbeat with `status`.
    pub fn heartbeat(
        &mut self,
        connection: &Connection,
        status: HeartbeatStatus,
        wall_ms: u64,
    ) -> Outcome {
        let heartbeat = Heartbeat::new(self.device_name.clone(), status, wall_ms);
        let mut actions = Vec::new();
        let status = self.publish_into(connection, &Message::Heartbeat(heartbeat), &mut actions);
        Outcome { status, actions }
    }

    /// Republish the current color and pattern so every device converges.
    pub fn sync_all(&mut self, connection: &Connection) -> Outcome {
        let mut actions = Vec::new();
        let status = self.publish_into(connection, &Message::Color(self.color), &mut actions);
        if status.is_sent() {
            self.publish_into(connection, &Message::Pattern(self.pattern), &mut actions);
            actions.push(SessionAction::Notice(Notice::success("Synced color and pattern")));
        }
        Outcome { status, actions }
    }

    /// Switch every device off.
    pub fn turn_off(&mut self, connection: &Connection) -> Outcome {
        self.set_pattern(connection, Pattern::Off)
    }

    /// Expiry callback from the driver.
    pub fn expire(&mut self, peer: PeerId, timer: TimerId) -> Vec<SessionAction> {
        self.scheduler.expire(peer, timer).into_iter().map(SessionAction::from).collect()
    }

    /// Close every window whose deadline has passed.
    pub fn poll_expired(&mut self, now: Instant) -> Vec<SessionAction> {
        self.scheduler.poll_expired(now).into_iter().map(SessionAction::from).collect()
    }

    /// Cancel all pending expiries.
    pub fn cancel_timers(&mut self) -> Vec<SessionAction> {
        self.scheduler.cancel_all().into_iter().map(SessionAction::from).collect()
    }

    fn trigger(&mut self, peer: PeerId, now: Instant) -> Vec<SessionAction> {
        self.scheduler
            .trigger(peer, self.response_duration, now)
            .into_iter()
            .map(SessionAction::from)
            .collect()
    }

    fn publish(&self, connection: &Connection, message: &Message) -> Option<SessionAction> {
        let topic = self.topics.get(message.kind());
        connection.publish(topic, message.encode()).map(SessionAction::from)
    }

    fn publish_into(
        &self,
        connection: &Connection,
        message: &Message,
        actions: &mut Vec<SessionAction>,
    ) -> PublishStatus {
        match self.publish(connection, message) {
            Some(action) => {
                actions.push(action);
                PublishStatus::Sent
            },
            None => {
                if message.kind() != TopicKind::Heartbeat {
                    actions.push(SessionAction::Notice(Notice::warning(format!(
                        "Offline, {} kept locally",
                        message.kind()
                    ))));
                }
                PublishStatus::Offline
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use whale_proto::PairingId;

    use super::*;
    use crate::transport::{ConnectOptions, TransportEvent};

    const WINDOW: Duration = Duration::from_millis(5000);

    fn setup() -> (Coordinator, Connection) {
        let topics = TopicSet::derive(&PairingId::new("demo"));
        let connection = Connection::new(ConnectOptions::default(), &topics);
        (Coordinator::new(topics, WINDOW, "web_panel".into()), connection)
    }

    fn connected() -> (Coordinator, Connection) {
        let (coordinator, mut connection) = setup();
        connection.start().unwrap();
        connection.handle_event(&TransportEvent::Connected);
        (coordinator, connection)
    }

    fn publishes(actions: &[SessionAction]) -> Vec<(String, String)> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Publish { topic, payload } => Some((topic.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn touch_triggers_other_peer() {
        let (mut coord, _) = setup();
        let now = Instant::now();

        coord.handle_inbound("pico_whale/demo/touch", b"whale_1:touch:1700000000000", now);

        assert!(coord.is_responding(PeerId::Whale2));
        assert!(!coord.is_responding(PeerId::Whale1));
        assert_eq!(coord.stats().touches_received, 1);
    }

    #[test]
    fn touch_alias_sender_is_accepted() {
        let (mut coord, _) = setup();
        coord.handle_inbound("pico_whale/demo/touch", b"peer_2:touch", Instant::now());
        assert!(coord.is_responding(PeerId::Whale1));
    }

    #[test]
    fn unknown_touch_sender_is_ignored() {
        let (mut coord, _) = setup();
        let now = Instant::now();

        for payload in [&b"whale_9:touch:1"[..], b":touch:1", b"whale_1"] {
            coord.handle_inbound("pico_whale/demo/touch", payload, now);
        }

        assert!(!coord.is_responding(PeerId::Whale1));
        assert!(!coord.is_responding(PeerId::Whale2));
        assert_eq!(coord.stats().touches_received, 0);
    }

    #[test]
    fn inbound_color_replaces_state() {
        let (mut coord, _) = setup();
        let actions = coord.handle_inbound("pico_whale/demo/color", b"200,50,10", Instant::now());

        assert_eq!(coord.color(), Rgb::new(200, 50, 10));
        assert_eq!(actions[0], SessionAction::ColorChanged(Rgb::new(200, 50, 10)));
    }

    #[test]
    fn malformed_color_keeps_state() {
        let (mut coord, _) = setup();
        let now = Instant::now();

        for payload in [&b"abc,50,10"[..], b"256,0,0", b"1,2", b"1,2,3,4", b"\xff\xfe"] {
            let actions = coord.handle_inbound("pico_whale/demo/color", payload, now);
            assert!(matches!(actions.as_slice(), [SessionAction::Notice(_)]));
        }
        assert_eq!(coord.color(), Rgb::DEFAULT_TOUCH);
    }

    #[test]
    fn unknown_pattern_keeps_previous() {
        let (mut coord, _) = setup();
        let now = Instant::now();

        coord.handle_inbound("pico_whale/demo/pattern", b"rainbow", now);
        coord.handle_inbound("pico_whale/demo/pattern", b"disco", now);

        assert_eq!(coord.pattern(), Pattern::Rainbow);
    }

    #[test]
    fn heartbeat_and_status_do_not_change_state() {
        let (mut coord, _) = setup();
        let now = Instant::now();

        let actions = coord.handle_inbound(
            "pico_whale/demo/heartbeat",
            br#"{"device":"whale_1","status":"online","uptime":12}"#,
            now,
        );
        assert!(matches!(&actions[..], [SessionAction::Notice(n)] if n.message.contains("whale_1")));

        coord.handle_inbound("pico_whale/demo/status", b"battery low", now);
        assert_eq!(coord.color(), Rgb::DEFAULT_TOUCH);
        assert_eq!(coord.pattern(), Pattern::Pulse);
    }

    #[test]
    fn foreign_topic_is_ignored() {
        let (mut coord, _) = setup();
        let actions =
            coord.handle_inbound("pico_whale/other/touch", b"whale_1:touch:1", Instant::now());
        assert!(actions.is_empty());
        assert!(!coord.is_responding(PeerId::Whale2));
    }

    #[test]
    fn online_touch_publishes_without_local_trigger() {
        let (mut coord, conn) = connected();

        let outcome = coord.request_touch(&conn, PeerId::Whale1, Instant::now(), 1_700_000_000_000);

        assert_eq!(outcome.status, PublishStatus::Sent);
        assert_eq!(
            publishes(&outcome.actions),
            vec![("pico_whale/demo/touch".into(), "whale_1:touch:1700000000000".into())]
        );
        assert!(!coord.is_responding(PeerId::Whale2));
        assert_eq!(coord.stats().touches_sent, 1);
    }

    #[test]
    fn offline_touch_simulates_locally() {
        let (mut coord, conn) = setup();

        let outcome = coord.request_touch(&conn, PeerId::Whale1, Instant::now(), 0);

        assert_eq!(outcome.status, PublishStatus::Offline);
        assert!(publishes(&outcome.actions).is_empty());
        assert!(coord.is_responding(PeerId::Whale2));
        assert!(!coord.is_responding(PeerId::Whale1));
    }

    #[test]
    fn set_color_offline_updates_state() {
        let (mut coord, conn) = setup();

        let outcome = coord.set_color(&conn, Rgb::new(1, 2, 3));

        assert_eq!(outcome.status, PublishStatus::Offline);
        assert!(publishes(&outcome.actions).is_empty());
        assert_eq!(coord.color(), Rgb::new(1, 2, 3));
    }

    #[test]
    fn set_pattern_online_publishes_name() {
        let (mut coord, conn) = connected();

        let outcome = coord.set_pattern(&conn, Pattern::Breathing);

        assert!(outcome.status.is_sent());
        assert_eq!(
            publishes(&outcome.actions),
            vec![("pico_whale/demo/pattern".into(), "breathing".into())]
        );
    }

    #[test]
    fn heartbeat_offline_is_a_no_op() {
        let (mut coord, conn) = setup();
        let outcome = coord.send_heartbeat(&conn, 1);
        assert_eq!(outcome, Outcome { status: PublishStatus::Offline, actions: Vec::new() });
    }

    #[test]
    fn heartbeat_online_uses_device_name() {
        let (mut coord, conn) = connected();
        let outcome = coord.send_heartbeat(&conn, 1_700_000_000_000);
        assert_eq!(
            publishes(&outcome.actions),
            vec![(
                "pico_whale/demo/heartbeat".into(),
                r#"{"device":"web_panel","status":"online","timestamp":1700000000000}"#.into()
            )]
        );
    }

    #[test]
    fn sync_all_republishes_color_then_pattern() {
        let (mut coord, conn) = connected();
        coord.set_color(&conn, Rgb::new(0, 255, 255));

        let outcome = coord.sync_all(&conn);
        assert_eq!(
            publishes(&outcome.actions),
            vec![
                ("pico_whale/demo/color".into(), "0,255,255".into()),
                ("pico_whale/demo/pattern".into(), "pulse".into()),
            ]
        );
    }

    #[test]
    fn turn_off_sets_off_pattern() {
        let (mut coord, conn) = setup();
        let outcome = coord.turn_off(&conn);
        assert_eq!(outcome.status, PublishStatus::Offline);
        assert_eq!(coord.pattern(), Pattern::Off);
    }
}
