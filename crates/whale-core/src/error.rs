//! Error types for the pairing state machines.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Misuse of the connection lifecycle API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Operation is not valid in the current state
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        /// State the lifecycle was in
        state: ConnectionState,
        /// Operation that was attempted
        operation: String,
    },
}

/// Failures reported by a transport implementation.
///
/// All of these are recoverable. The lifecycle reacts by changing state or
/// logging; none of them stop the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection attempt failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// Broker rejected or failed the subscription
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// Publish could not be handed to the broker
    #[error("publish failed: {0}")]
    Publish(String),

    /// Handle is no longer connected
    #[error("transport closed")]
    Closed,
}
