//! Touch payload: `{peer}:touch:{unix_millis}`.

use crate::{errors::DecodeError, peer::PeerId};

/// Marker in the second field of a touch payload.
const TOUCH_TAG: &str = "touch";

/// A physical touch on one whale.
///
/// # Protocol Flow
///
/// 1. A whale (or the control surface on its behalf) publishes a touch naming
///    itself as sender
/// 2. The broker delivers it to every subscriber, including the sender
/// 3. Each receiver starts the response of the *other* whale, so the sender
///    never lights up for its own touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Touch {
    /// Whale that was touched
    pub sender: PeerId,

    /// Sender's clock when the touch happened.
    ///
    /// Informational only. The control surface sends milliseconds, device
    /// firmware sends seconds; nothing orders or expires touches by it.
    pub timestamp: Option<u64>,
}

impl Touch {
    /// Touch from `sender` stamped with `timestamp`.
    pub fn new(sender: PeerId, timestamp: u64) -> Self {
        Self { sender, timestamp: Some(timestamp) }
    }

    /// Wire encoding.
    pub fn encode(&self) -> String {
        match self.timestamp {
            Some(timestamp) => format!("{}:{TOUCH_TAG}:{timestamp}", self.sender),
            None => format!("{}:{TOUCH_TAG}", self.sender),
        }
    }

    /// Decode a touch payload.
    ///
    /// Needs at least two colon-separated fields. The timestamp is optional;
    /// a missing or non-numeric timestamp decodes as `None` rather than
    /// failing.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = payload.split(':').collect();
        if fields.len() < 2 {
            return Err(DecodeError::MissingFields { expected: 2, found: fields.len() });
        }

        let sender = fields[0].parse::<PeerId>()?;
        let timestamp = fields.get(2).and_then(|raw| raw.parse::<u64>().ok());
        Ok(Self { sender, timestamp })
    }
}
