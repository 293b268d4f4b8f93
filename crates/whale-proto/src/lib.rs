//! Wire format for the Pico Whale pairing protocol.
//!
//! Peers never talk to each other directly. Every intent travels through a
//! publish/subscribe broker on one of five topics derived from a pairing
//! identity, and every payload is short delimited text so that
//! microcontroller firmware can produce and parse it without a JSON library.
//! The only structured payload is the heartbeat, which is JSON.
//!
//! Encodings must match the devices byte for byte:
//!
//! | Topic       | Payload                                  |
//! |-------------|------------------------------------------|
//! | `touch`     | `{peer}:touch:{unix_millis}`             |
//! | `color`     | `{r},{g},{b}`                            |
//! | `pattern`   | raw pattern name                         |
//! | `heartbeat` | `{"device":..,"status":..,"timestamp":..}` |
//! | `status`    | reserved, passed through as text         |
//!
//! Decoding never panics. Malformed payloads produce a [`DecodeError`] and
//! consumers are expected to drop the message, since any client on the broker
//! can publish to these topics.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod color;
pub mod errors;
pub mod message;
pub mod pattern;
pub mod payloads;
pub mod peer;
pub mod topics;

pub use color::Rgb;
pub use errors::{DecodeError, Result};
pub use message::Message;
pub use pattern::Pattern;
pub use payloads::{Heartbeat, HeartbeatStatus, Touch};
pub use peer::PeerId;
pub use topics::{PairingId, TOPIC_PREFIX, TopicKind, TopicSet};
