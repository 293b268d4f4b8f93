//! Decode errors.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Reasons a payload could not be decoded.
///
/// None of these are faults. The broker is shared and any client may publish
/// non-conforming payloads, so callers drop the message and move on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload bytes were not UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// A delimited payload had fewer fields than required.
    #[error("expected at least {expected} fields, found {found}")]
    MissingFields {
        /// Minimum number of fields
        expected: usize,
        /// Number of fields present
        found: usize,
    },

    /// Sender is empty or not one of the paired peers.
    #[error("unknown peer: {0:?}")]
    UnknownPeer(String),

    /// Color payload did not have exactly three components.
    #[error("color needs 3 components, found {0}")]
    ComponentCount(usize),

    /// A color component is not a decimal integer.
    #[error("color component {index} is not an integer: {value:?}")]
    NotAnInteger {
        /// Zero-based component position (r, g, b)
        index: usize,
        /// Raw component text
        value: String,
    },

    /// A color component has leading zeros, e.g. `007`.
    #[error("color component {index} has leading zeros: {value:?}")]
    LeadingZero {
        /// Zero-based component position (r, g, b)
        index: usize,
        /// Raw component text
        value: String,
    },

    /// A color component is an integer outside 0..=255.
    #[error("color component {index} out of range: {value}")]
    OutOfRange {
        /// Zero-based component position (r, g, b)
        index: usize,
        /// Parsed value
        value: u64,
    },

    /// A `#rrggbb` string was malformed.
    #[error("invalid hex color: {0:?}")]
    InvalidHex(String),

    /// Pattern name is not in the known set.
    #[error("unknown pattern: {0:?}")]
    UnknownPattern(String),

    /// Heartbeat JSON did not match the expected shape.
    #[error("invalid heartbeat: {0}")]
    Heartbeat(String),
}
