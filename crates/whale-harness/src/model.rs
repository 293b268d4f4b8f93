//! Reference model for model-based testing.
//!
//! [`ModelWorld`] is a deliberately naive re-statement of the pairing rules:
//! plain fields, millisecond integers and no actions. Property tests apply
//! the same random [`Operation`] sequence to the model and to a real
//! [`Session`](whale_core::Session) and require identical observable state
//! after every step.

use arbitrary::Arbitrary;
use whale_core::{ConnectionState, PublishStatus};
use whale_proto::{Pattern, PeerId, Rgb};

/// Response window length used by the model, milliseconds.
pub const MODEL_RESPONSE_MS: u64 = 5000;

/// One step of a generated scenario.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// `Session::start`
    Start,
    /// `Session::stop`
    Stop,
    /// Transport reports a connection
    TransportConnected,
    /// Transport reports the link closed
    TransportClosed,
    /// Transport reports a failure
    TransportError,
    /// Transport starts a reconnect attempt
    TransportReconnecting,
    /// Touch message from a device
    InboundTouch {
        /// Sender
        sender: PeerId,
    },
    /// Color message from a device
    InboundColor(Rgb),
    /// Pattern message from a device
    InboundPattern(Pattern),
    /// Color message that does not decode
    InboundGarbageColor,
    /// Control surface touch
    RequestTouch {
        /// Whale touched
        peer: PeerId,
    },
    /// Control surface color change
    SetColor(Rgb),
    /// Control surface pattern change
    SetPattern(Pattern),
    /// Online heartbeat
    Heartbeat,
    /// Republish color and pattern
    SyncAll,
    /// Pattern `off`
    TurnOff,
    /// Move time forward and expire due windows
    AdvanceTime {
        /// Milliseconds
        millis: u16,
    },
}

/// Result of applying an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Applied with no publish status
    Ok,
    /// Outbound operation with its status
    Published(PublishStatus),
    /// Rejected as invalid in the current state
    Rejected,
}

impl OperationResult {
    /// True unless rejected.
    pub fn is_ok(self) -> bool {
        self != Self::Rejected
    }
}

/// State both worlds expose for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservableState {
    /// Connection state
    pub connection: ConnectionState,
    /// Shared color
    pub color: Rgb,
    /// Shared pattern
    pub pattern: Pattern,
    /// Responding flags
    pub responding: [bool; 2],
}

/// Reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    now_ms: u64,
    connection: ConnectionState,
    color: Rgb,
    pattern: Pattern,
    deadlines: [Option<u64>; 2],
}

impl ModelWorld {
    /// Fresh model at time zero.
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            connection: ConnectionState::Idle,
            color: Rgb::DEFAULT_TOUCH,
            pattern: Pattern::Pulse,
            deadlines: [None, None],
        }
    }

    /// Virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Current observable state.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            connection: self.connection,
            color: self.color,
            pattern: self.pattern,
            responding: [self.deadlines[0].is_some(), self.deadlines[1].is_some()],
        }
    }

    fn online(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    fn status(&self) -> OperationResult {
        if self.online() {
            OperationResult::Published(PublishStatus::Sent)
        } else {
            OperationResult::Published(PublishStatus::Offline)
        }
    }

    fn trigger(&mut self, peer: PeerId) {
        self.deadlines[peer.index()] = Some(self.now_ms + MODEL_RESPONSE_MS);
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        use ConnectionState::{Connected, Connecting, Disconnected, Idle};

        match op {
            Operation::Start => {
                if self.connection != Idle {
                    return OperationResult::Rejected;
                }
                self.connection = Connecting;
            },
            Operation::Stop => self.connection = Idle,
            Operation::TransportConnected => {
                if matches!(self.connection, Connecting | Disconnected) {
                    self.connection = Connected;
                }
            },
            Operation::TransportClosed | Operation::TransportError => {
                if matches!(self.connection, Connecting | Connected) {
                    self.connection = Disconnected;
                }
            },
            Operation::TransportReconnecting => {
                if self.connection == Disconnected {
                    self.connection = Connecting;
                }
            },
            Operation::InboundTouch { sender } => {
                if self.online() {
                    self.trigger(sender.other());
                }
            },
            Operation::InboundColor(color) => {
                if self.online() {
                    self.color = *color;
                }
            },
            Operation::InboundPattern(pattern) => {
                if self.online() {
                    self.pattern = *pattern;
                }
            },
            Operation::InboundGarbageColor => {},
            Operation::RequestTouch { peer } => {
                let status = self.status();
                if !self.online() {
                    self.trigger(peer.other());
                }
                return status;
            },
            Operation::SetColor(color) => {
                self.color = *color;
                return self.status();
            },
            Operation::SetPattern(pattern) => {
                self.pattern = *pattern;
                return self.status();
            },
            Operation::TurnOff => {
                self.pattern = Pattern::Off;
                return self.status();
            },
            Operation::Heartbeat | Operation::SyncAll => return self.status(),
            Operation::AdvanceTime { millis } => {
                self.now_ms += u64::from(*millis);
                let now = self.now_ms;
                for deadline in &mut self.deadlines {
                    if deadline.is_some_and(|d| d <= now) {
                        *deadline = None;
                    }
                }
            },
        }
        OperationResult::Ok
    }
}

impl Default for ModelWorld {
    fn default() -> Self {
        Self::new()
    }
}
