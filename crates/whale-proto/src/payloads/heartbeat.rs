//! Heartbeat payload (JSON).

use serde::Deserialize;
use serde_json::json;

use crate::errors::DecodeError;

/// Liveness state announced in a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
    /// Device is up and connected
    Online,
    /// Device is shutting down
    Offline,
}

impl HeartbeatStatus {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// "I'm alive" announcement.
///
/// Devices add extra fields (uptime, counters, current pattern); those are
/// ignored on decode. Device firmware omits the timestamp, hence `Option`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Heartbeat {
    /// Announcing device name
    pub device: String,
    /// Liveness state
    pub status: HeartbeatStatus,
    /// Sender clock, unix milliseconds
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl Heartbeat {
    /// Heartbeat for `device` at `timestamp`.
    pub fn new(device: impl Into<String>, status: HeartbeatStatus, timestamp: u64) -> Self {
        Self { device: device.into(), status, timestamp: Some(timestamp) }
    }

    /// Compact JSON with keys `device`, `status`, `timestamp` in that order.
    pub fn encode(&self) -> String {
        // Object keys serialize sorted, which is also the field order devices use.
        let mut value = json!({
            "device": self.device,
            "status": self.status.as_str(),
        });
        if let Some(timestamp) = self.timestamp {
            value["timestamp"] = timestamp.into();
        }
        value.to_string()
    }

    /// Decode heartbeat JSON.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(payload).map_err(|e| DecodeError::Heartbeat(e.to_string()))
    }
}
