//! Structured payload types.
//!
//! Color and pattern payloads are plain values ([`crate::Rgb`],
//! [`crate::Pattern`]); the two payloads with more than one field live here.

pub mod heartbeat;
pub mod touch;

pub use heartbeat::{Heartbeat, HeartbeatStatus};
pub use touch::Touch;
