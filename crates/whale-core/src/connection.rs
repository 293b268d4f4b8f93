//! Connection lifecycle state machine.
//!
//! Owns the connection state and decides when to open the transport, when to
//! subscribe and whether publishing is possible. While a handle is open,
//! reconnect cadence is the transport's job and shows up here only as
//! `Reconnecting` events. When the handle itself is lost (connect refused or
//! the handle finished), the lifecycle asks the driver for a retry after
//! `reconnect_period` and reopens on [`Connection::retry`].
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods take transport events as input (no stored transport)
//! - Methods return `Vec<ConnectionAction>` for the driver to execute
//! - Invalid API use returns [`ConnectionError`]; unexpected transport events
//!   are logged and ignored, never fatal
//!
//! # State Machine
//!
//! ```text
//!            start()               Connected
//! ┌──────┐ ─────────> ┌────────────┐ ────────> ┌───────────┐
//! │ Idle │            │ Connecting │           │ Connected │
//! └──────┘            └────────────┘           └───────────┘
//!    ^                  │      ^                     │
//!    │     Error/Closed │      │ Reconnecting,       │ Error/Closed,
//!    │    transport_lost│      │ retry()             │ transport_lost
//!    │                  v      │                     v
//!    │               ┌──────────────┐ <──────────────┘
//!    │               │ Disconnected │
//!    │               └──────────────┘
//!    └──────────── stop() from any state
//! ```
//!
//! # Invariants
//!
//! - At most one transport handle is open at a time: `Open` is only emitted
//!   when no handle is open, and `stop()` is the only way back to `Idle`
//! - A lost handle always leads to a scheduled retry unless stopped
//! - `Connected` is only entered from `Connecting`
//! - Publishing while not `Connected` yields no action; nothing is queued

use std::time::Duration;

use tracing::{debug, info, warn};
use whale_proto::TopicSet;

use crate::{
    error::{ConnectionError, TransportError},
    notice::Notice,
    transport::{ConnectOptions, TransportEvent},
};

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a transport handle with these options
    Open(ConnectOptions),

    /// Subscribe to all of these topics in one call
    Subscribe(Vec<String>),

    /// Publish a payload
    Publish {
        /// Full topic name
        topic: String,
        /// Encoded payload
        payload: String,
    },

    /// Disconnect and release the transport handle
    Disconnect,

    /// Call [`Connection::retry`] after this delay
    ScheduleRetry(Duration),

    /// Connection state changed; observers should be told
    StateChanged(ConnectionState),

    /// Log line for the user
    Notice(Notice),
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not started, or stopped
    #[default]
    Idle,
    /// Waiting for the transport to report a connection
    Connecting,
    /// Live connection, subscriptions requested
    Connected,
    /// Connection lost or attempt failed; waiting for the transport to retry
    Disconnected,
}

impl ConnectionState {
    /// Short lowercase label for status displays.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Connection lifecycle
///
/// This is a pure state machine - no I/O. The driver executes the returned
/// actions and feeds transport events back in.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Current state
    state: ConnectionState,
    /// Options for the transport
    options: ConnectOptions,
    /// Topics subscribed on every (re)connect
    topics: Vec<String>,
    /// Whether a transport handle is currently open
    handle_open: bool,
    /// Number of transport reconnect attempts seen
    reconnects: u64,
}

impl Connection {
    /// Create a lifecycle in `Idle` state.
    pub fn new(options: ConnectOptions, topics: &TopicSet) -> Self {
        Self {
            state: ConnectionState::Idle,
            options,
            topics: topics.all(),
            handle_open: false,
            reconnects: 0,
        }
    }

    /// Get current state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True when publishing would reach the broker.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// True while a transport handle is open.
    #[must_use]
    pub fn has_handle(&self) -> bool {
        self.handle_open
    }

    /// Number of reconnect attempts reported by the transport.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Options passed to the transport.
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Begin connecting (Idle -> Connecting).
    ///
    /// # Errors
    /// Returns `InvalidState` if not in `Idle` state
    pub fn start(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Idle {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "start".to_string(),
            });
        }

        self.handle_open = true;
        let mut actions = vec![
            ConnectionAction::Open(self.options.clone()),
            ConnectionAction::Notice(Notice::info(format!("Connecting to {}", self.options.url))),
        ];
        actions.extend(self.transition(ConnectionState::Connecting));
        Ok(actions)
    }

    /// Stop from any state, releasing the transport handle.
    ///
    /// Returns no actions when already `Idle`.
    pub fn stop(&mut self) -> Vec<ConnectionAction> {
        if self.state == ConnectionState::Idle && !self.handle_open {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.handle_open {
            self.handle_open = false;
            actions.push(ConnectionAction::Disconnect);
        }
        actions.push(ConnectionAction::Notice(Notice::info("Connection stopped")));
        actions.extend(self.transition(ConnectionState::Idle));
        actions
    }

    /// Handle a lifecycle event from the transport.
    ///
    /// `Message` events carry no lifecycle meaning and produce no actions;
    /// the session routes them to the coordinator.
    pub fn handle_event(&mut self, event: &TransportEvent) -> Vec<ConnectionAction> {
        match (self.state, event) {
            (ConnectionState::Idle, _) => {
                debug!(?event, "ignoring transport event while idle");
                Vec::new()
            },

            (_, TransportEvent::Message { .. }) => Vec::new(),

            (ConnectionState::Connecting, TransportEvent::Connected) => self.on_connected(),

            (ConnectionState::Disconnected, TransportEvent::Connected) => {
                // Transport skipped its reconnect notice. Pass through
                // Connecting so Connected is still only entered from there.
                warn!("transport connected without a reconnect notice");
                let mut actions = self.transition(ConnectionState::Connecting);
                actions.extend(self.on_connected());
                actions
            },

            (ConnectionState::Connected, TransportEvent::Connected) => {
                debug!("duplicate connected event");
                Vec::new()
            },

            (
                ConnectionState::Connected | ConnectionState::Connecting,
                TransportEvent::Error { reason },
            ) => {
                let mut actions = vec![ConnectionAction::Notice(Notice::error(format!(
                    "Transport error: {reason}"
                )))];
                actions.extend(self.transition(ConnectionState::Disconnected));
                actions
            },

            (ConnectionState::Connected | ConnectionState::Connecting, TransportEvent::Closed) => {
                let mut actions =
                    vec![ConnectionAction::Notice(Notice::warning("Connection closed"))];
                actions.extend(self.transition(ConnectionState::Disconnected));
                actions
            },

            (ConnectionState::Disconnected, TransportEvent::Error { reason }) => {
                debug!(%reason, "transport error while disconnected");
                Vec::new()
            },

            (ConnectionState::Disconnected, TransportEvent::Closed) => Vec::new(),

            (ConnectionState::Disconnected, TransportEvent::Reconnecting) => {
                self.reconnects += 1;
                let mut actions = vec![ConnectionAction::Notice(Notice::info("Reconnecting..."))];
                actions.extend(self.transition(ConnectionState::Connecting));
                actions
            },

            (ConnectionState::Connecting | ConnectionState::Connected, TransportEvent::Reconnecting) => {
                debug!(state = ?self.state, "ignoring reconnect notice");
                Vec::new()
            },
        }
    }

    /// The transport handle is gone: `connect` failed, or the handle finished
    /// and will report nothing more.
    ///
    /// Moves to `Disconnected` and schedules a [`Connection::retry`] after
    /// `reconnect_period`. Ignored while `Idle`.
    pub fn transport_lost(&mut self, reason: &str) -> Vec<ConnectionAction> {
        if self.state == ConnectionState::Idle {
            debug!(%reason, "transport lost while idle");
            return Vec::new();
        }

        warn!(%reason, retry_in = ?self.options.reconnect_period, "transport lost");
        self.handle_open = false;
        let mut actions = vec![ConnectionAction::Notice(Notice::error(format!(
            "Transport error: {reason}"
        )))];
        actions.extend(self.transition(ConnectionState::Disconnected));
        actions.push(ConnectionAction::ScheduleRetry(self.options.reconnect_period));
        actions
    }

    /// Reopen after a lost handle (Disconnected -> Connecting).
    ///
    /// Stale retries are ignored: after a `stop()`, or once a handle is open
    /// again, this returns no actions.
    pub fn retry(&mut self) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Disconnected || self.handle_open {
            debug!(state = ?self.state, handle_open = self.handle_open, "ignoring stale retry");
            return Vec::new();
        }

        self.reconnects += 1;
        self.handle_open = true;
        let mut actions = vec![
            ConnectionAction::Open(self.options.clone()),
            ConnectionAction::Notice(Notice::info("Reconnecting...")),
        ];
        actions.extend(self.transition(ConnectionState::Connecting));
        actions
    }

    /// Report the outcome of the batched subscribe.
    ///
    /// A failure is logged and reported but does not change state.
    pub fn subscribe_result(&self, result: &Result<(), TransportError>) -> Vec<ConnectionAction> {
        match result {
            Ok(()) => vec![ConnectionAction::Notice(Notice::info("Subscribed to whale topics"))],
            Err(e) => {
                warn!(error = %e, "subscribe failed");
                vec![ConnectionAction::Notice(Notice::error(format!("Subscribe error: {e}")))]
            },
        }
    }

    /// Build a publish action, or `None` when not connected.
    ///
    /// Offline publishes are dropped here, never buffered.
    pub fn publish(&self, topic: &str, payload: String) -> Option<ConnectionAction> {
        if self.is_connected() {
            Some(ConnectionAction::Publish { topic: topic.to_string(), payload })
        } else {
            warn!(%topic, state = ?self.state, "offline, publish dropped");
            None
        }
    }

    fn on_connected(&mut self) -> Vec<ConnectionAction> {
        let mut actions = self.transition(ConnectionState::Connected);
        actions.push(ConnectionAction::Notice(Notice::success("Connected to broker")));
        actions.push(ConnectionAction::Subscribe(self.topics.clone()));
        actions
    }

    fn transition(&mut self, next: ConnectionState) -> Vec<ConnectionAction> {
        if self.state == next {
            return Vec::new();
        }
        info!(from = ?self.state, to = ?next, "connection state");
        self.state = next;
        vec![ConnectionAction::StateChanged(next)]
    }
}

#[cfg(test)]
mod tests {
    use whale_proto::PairingId;

    use super::*;

    fn connection() -> Connection {
        Connection::new(ConnectOptions::default(), &TopicSet::derive(&PairingId::new("demo")))
    }

    fn states(actions: &[ConnectionAction]) -> Vec<ConnectionState> {
        actions
            .iter()
            .filter_map(|a| match a {
                ConnectionAction::StateChanged(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn connection_lifecycle() {
        let mut conn = connection();
        assert_eq!(conn.state(), ConnectionState::Idle);

        let actions = conn.start().unwrap();
        assert!(matches!(actions[0], ConnectionAction::Open(_)));
        assert_eq!(states(&actions), vec![ConnectionState::Connecting]);

        let actions = conn.handle_event(&TransportEvent::Connected);
        assert_eq!(states(&actions), vec![ConnectionState::Connected]);
        assert!(conn.is_connected());

        let actions = conn.handle_event(&TransportEvent::Closed);
        assert_eq!(states(&actions), vec![ConnectionState::Disconnected]);

        let actions = conn.handle_event(&TransportEvent::Reconnecting);
        assert_eq!(states(&actions), vec![ConnectionState::Connecting]);
        assert_eq!(conn.reconnects(), 1);

        let actions = conn.stop();
        assert_eq!(actions.first(), Some(&ConnectionAction::Disconnect));
        assert_eq!(states(&actions), vec![ConnectionState::Idle]);
        assert!(!conn.has_handle());
    }

    #[test]
    fn connected_subscribes_to_all_five_topics_at_once() {
        let mut conn = connection();
        conn.start().unwrap();

        let actions = conn.handle_event(&TransportEvent::Connected);
        let subscribes: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                ConnectionAction::Subscribe(topics) => Some(topics.clone()),
                _ => None,
            })
            .collect();

        assert_eq!(
            subscribes,
            vec![vec![
                "pico_whale/demo/touch".to_string(),
                "pico_whale/demo/heartbeat".to_string(),
                "pico_whale/demo/color".to_string(),
                "pico_whale/demo/pattern".to_string(),
                "pico_whale/demo/status".to_string(),
            ]]
        );
    }

    #[test]
    fn failed_attempt_goes_to_disconnected() {
        let mut conn = connection();
        conn.start().unwrap();

        let actions = conn.handle_event(&TransportEvent::Error { reason: "refused".into() });
        assert_eq!(states(&actions), vec![ConnectionState::Disconnected]);
        assert!(conn.has_handle());
    }

    #[test]
    fn subscribe_failure_keeps_state() {
        let mut conn = connection();
        conn.start().unwrap();
        conn.handle_event(&TransportEvent::Connected);

        let actions = conn.subscribe_result(&Err(TransportError::Subscribe("denied".into())));
        assert!(states(&actions).is_empty());
        assert!(matches!(&actions[0], ConnectionAction::Notice(n) if n.message.contains("denied")));
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn connected_is_only_entered_from_connecting() {
        let mut conn = connection();
        conn.start().unwrap();
        conn.handle_event(&TransportEvent::Error { reason: "x".into() });

        let actions = conn.handle_event(&TransportEvent::Connected);
        assert_eq!(states(&actions), vec![ConnectionState::Connecting, ConnectionState::Connected]);
    }

    #[test]
    fn events_while_idle_are_ignored() {
        let mut conn = connection();
        for event in [
            TransportEvent::Connected,
            TransportEvent::Closed,
            TransportEvent::Reconnecting,
            TransportEvent::Error { reason: "late".into() },
        ] {
            assert!(conn.handle_event(&event).is_empty());
            assert_eq!(conn.state(), ConnectionState::Idle);
        }
    }

    #[test]
    fn reconnect_notice_only_counts_from_disconnected() {
        let mut conn = connection();
        conn.start().unwrap();
        assert!(conn.handle_event(&TransportEvent::Reconnecting).is_empty());
        conn.handle_event(&TransportEvent::Connected);
        assert!(conn.handle_event(&TransportEvent::Reconnecting).is_empty());
        assert_eq!(conn.reconnects(), 0);
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn invalid_state_transitions() {
        let mut conn = connection();
        conn.start().unwrap();

        let result = conn.start();
        assert!(matches!(
            result,
            Err(ConnectionError::InvalidState { state: ConnectionState::Connecting, .. })
        ));
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let mut conn = connection();
        assert!(conn.stop().is_empty());
    }

    #[test]
    fn restart_after_stop_opens_a_fresh_handle() {
        let mut conn = connection();
        conn.start().unwrap();
        conn.stop();

        let actions = conn.start().unwrap();
        assert!(matches!(actions[0], ConnectionAction::Open(_)));
        assert!(conn.has_handle());
    }

    #[test]
    fn publish_requires_connected() {
        let mut conn = connection();
        assert_eq!(conn.publish("t", "p".into()), None);

        conn.start().unwrap();
        assert_eq!(conn.publish("t", "p".into()), None);

        conn.handle_event(&TransportEvent::Connected);
        assert_eq!(
            conn.publish("t", "p".into()),
            Some(ConnectionAction::Publish { topic: "t".into(), payload: "p".into() })
        );

        conn.handle_event(&TransportEvent::Closed);
        assert_eq!(conn.publish("t", "p".into()), None);
    }

    #[test]
    fn lost_handle_schedules_retry_and_reopens() {
        let mut conn = connection();
        conn.start().unwrap();

        let actions = conn.transport_lost("connect refused");
        assert_eq!(states(&actions), vec![ConnectionState::Disconnected]);
        assert_eq!(actions.last(), Some(&ConnectionAction::ScheduleRetry(Duration::from_secs(5))));
        assert!(!conn.has_handle());

        let actions = conn.retry();
        assert!(matches!(actions[0], ConnectionAction::Open(_)));
        assert_eq!(states(&actions), vec![ConnectionState::Connecting]);
        assert!(conn.has_handle());
        assert_eq!(conn.reconnects(), 1);

        // A second retry for the same loss finds a handle open
        assert!(conn.retry().is_empty());
    }

    #[test]
    fn retry_after_stop_is_ignored() {
        let mut conn = connection();
        conn.start().unwrap();
        conn.handle_event(&TransportEvent::Connected);
        conn.transport_lost("handle finished");

        let actions = conn.stop();
        assert!(!actions.contains(&ConnectionAction::Disconnect));
        assert_eq!(conn.state(), ConnectionState::Idle);

        assert!(conn.retry().is_empty());
        assert!(conn.transport_lost("late").is_empty());
        assert_eq!(conn.state(), ConnectionState::Idle);

        // start works again without an intervening retry
        assert!(conn.start().is_ok());
    }
}
