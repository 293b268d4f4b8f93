//! Actions a [`Session`](crate::Session) asks its driver to perform.

use std::time::{Duration, Instant};

use whale_proto::{Pattern, PeerId, Rgb};

use crate::{
    connection::{ConnectionAction, ConnectionState},
    notice::Notice,
    scheduler::{SchedulerAction, TimerId},
    transport::ConnectOptions,
};

/// Everything the session can ask for, flattened for one executor.
///
/// Transport actions must be executed in order. Signal actions
/// (`*Changed`, `Notice`) are informational; the snapshot taken after the
/// step already reflects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a transport handle
    Open(ConnectOptions),

    /// Subscribe to all topics in one call
    Subscribe(Vec<String>),

    /// Publish a payload
    Publish {
        /// Full topic name
        topic: String,
        /// Encoded payload
        payload: String,
    },

    /// Disconnect and drop the transport handle
    Disconnect,

    /// Call [`Session::retry`](crate::Session::retry) after this delay
    ScheduleRetry(Duration),

    /// Schedule an expiry callback
    ScheduleExpiry {
        /// Window owner
        peer: PeerId,
        /// Timer handle
        timer: TimerId,
        /// Deadline
        at: Instant,
    },

    /// Cancel a scheduled expiry
    CancelExpiry {
        /// Window owner
        peer: PeerId,
        /// Timer handle
        timer: TimerId,
    },

    /// Connection state changed
    ConnectionChanged(ConnectionState),

    /// A peer started or stopped responding
    RespondingChanged {
        /// Peer
        peer: PeerId,
        /// New flag
        responding: bool,
    },

    /// Shared color replaced
    ColorChanged(Rgb),

    /// Shared pattern replaced
    PatternChanged(Pattern),

    /// Log line for the user
    Notice(Notice),
}

impl SessionAction {
    /// True for actions that touch the transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Open(_) | Self::Subscribe(_) | Self::Publish { .. } | Self::Disconnect)
    }
}

impl From<ConnectionAction> for SessionAction {
    fn from(action: ConnectionAction) -> Self {
        match action {
            ConnectionAction::Open(options) => Self::Open(options),
            ConnectionAction::Subscribe(topics) => Self::Subscribe(topics),
            ConnectionAction::Publish { topic, payload } => Self::Publish { topic, payload },
            ConnectionAction::Disconnect => Self::Disconnect,
            ConnectionAction::ScheduleRetry(after) => Self::ScheduleRetry(after),
            ConnectionAction::StateChanged(state) => Self::ConnectionChanged(state),
            ConnectionAction::Notice(notice) => Self::Notice(notice),
        }
    }
}

impl From<SchedulerAction> for SessionAction {
    fn from(action: SchedulerAction) -> Self {
        match action {
            SchedulerAction::ScheduleExpiry { peer, timer, at } => {
                Self::ScheduleExpiry { peer, timer, at }
            },
            SchedulerAction::CancelExpiry { peer, timer } => Self::CancelExpiry { peer, timer },
            SchedulerAction::RespondingChanged { peer, responding } => {
                Self::RespondingChanged { peer, responding }
            },
        }
    }
}
