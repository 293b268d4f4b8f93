//! Runtime errors.

use thiserror::Error;
use whale_core::ConnectionError;

/// Errors returned through the control handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runtime has shut down; no command can be delivered
    #[error("runtime has shut down")]
    Closed,

    /// Lifecycle misuse, e.g. starting twice
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The session task panicked or was cancelled
    #[error("session task failed: {0}")]
    Join(String),
}
