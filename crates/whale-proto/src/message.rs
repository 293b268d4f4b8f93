//! Message enum tying topics to payload codecs.

use crate::{
    color::Rgb,
    errors::DecodeError,
    pattern::Pattern,
    payloads::{Heartbeat, Touch},
    topics::TopicKind,
};

/// A decoded message on one of the pair's topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A whale was touched
    Touch(Touch),
    /// Shared color changed
    Color(Rgb),
    /// Shared pattern changed
    Pattern(Pattern),
    /// Liveness announcement
    Heartbeat(Heartbeat),
    /// Reserved status text, not interpreted
    Status(String),
}

impl Message {
    /// Topic this message is published on.
    pub fn kind(&self) -> TopicKind {
        match self {
            Self::Touch(_) => TopicKind::Touch,
            Self::Color(_) => TopicKind::Color,
            Self::Pattern(_) => TopicKind::Pattern,
            Self::Heartbeat(_) => TopicKind::Heartbeat,
            Self::Status(_) => TopicKind::Status,
        }
    }

    /// Wire payload.
    pub fn encode(&self) -> String {
        match self {
            Self::Touch(touch) => touch.encode(),
            Self::Color(color) => color.encode(),
            Self::Pattern(pattern) => pattern.as_str().to_string(),
            Self::Heartbeat(heartbeat) => heartbeat.encode(),
            Self::Status(text) => text.clone(),
        }
    }

    /// Decode `payload` received on a topic of `kind`.
    pub fn decode(kind: TopicKind, payload: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
        match kind {
            TopicKind::Touch => Touch::decode(text).map(Self::Touch),
            TopicKind::Color => Rgb::decode(text).map(Self::Color),
            TopicKind::Pattern => Pattern::decode(text).map(Self::Pattern),
            TopicKind::Heartbeat => Heartbeat::decode(text).map(Self::Heartbeat),
            TopicKind::Status => Ok(Self::Status(text.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HeartbeatStatus, PeerId};

    #[test]
    fn decode_dispatches_by_kind() {
        assert_eq!(
            Message::decode(TopicKind::Color, b"200,50,10"),
            Ok(Message::Color(Rgb::new(200, 50, 10)))
        );
        assert_eq!(
            Message::decode(TopicKind::Pattern, b"rainbow"),
            Ok(Message::Pattern(Pattern::Rainbow))
        );
        assert_eq!(
            Message::decode(TopicKind::Status, b"anything goes"),
            Ok(Message::Status("anything goes".into()))
        );
    }

    #[test]
    fn same_payload_means_different_things_per_topic() {
        assert!(Message::decode(TopicKind::Touch, b"200,50,10").is_err());
        assert!(Message::decode(TopicKind::Color, b"whale_1:touch:1").is_err());
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        assert_eq!(Message::decode(TopicKind::Status, &[0xff, 0xfe]), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn kind_matches_encoding_topic() {
        let messages = [
            Message::Touch(Touch::new(PeerId::Whale1, 1)),
            Message::Color(Rgb::new(1, 2, 3)),
            Message::Pattern(Pattern::Off),
            Message::Heartbeat(Heartbeat::new("web_panel", HeartbeatStatus::Online, 1)),
            Message::Status("ok".into()),
        ];
        for message in messages {
            let decoded = Message::decode(message.kind(), message.encode().as_bytes()).unwrap();
            assert_eq!(decoded, message);
        }
    }
}
