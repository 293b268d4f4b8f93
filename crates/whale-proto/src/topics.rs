//! Topic namespace.
//!
//! All traffic for one pair of whales lives under
//! `pico_whale/{pairing_id}/`. The five leaf topics are fixed, so a
//! [`TopicSet`] is derived once at startup and never changes.

use std::fmt;

/// Root segment shared by every topic.
pub const TOPIC_PREFIX: &str = "pico_whale";

/// Opaque identifier naming one pair of devices.
///
/// Only used to namespace topics. Two panels with the same pairing identity
/// control the same pair of whales.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairingId(String);

impl PairingId {
    /// Wrap a pairing identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The leaf segment of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// Touch events
    Touch,
    /// Liveness announcements
    Heartbeat,
    /// Shared color
    Color,
    /// Shared light pattern
    Pattern,
    /// Reserved for auxiliary status display
    Status,
}

impl TopicKind {
    /// Every kind, in subscription order.
    pub const ALL: [Self; 5] = [Self::Touch, Self::Heartbeat, Self::Color, Self::Pattern, Self::Status];

    /// Leaf segment as it appears on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Touch => "touch",
            Self::Heartbeat => "heartbeat",
            Self::Color => "color",
            Self::Pattern => "pattern",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five topic names for one pairing identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    pairing: PairingId,
    touch: String,
    heartbeat: String,
    color: String,
    pattern: String,
    status: String,
}

impl TopicSet {
    /// Derive the topic names for `pairing`. Pure and deterministic.
    pub fn derive(pairing: &PairingId) -> Self {
        let topic = |kind: TopicKind| format!("{TOPIC_PREFIX}/{pairing}/{kind}");
        Self {
            pairing: pairing.clone(),
            touch: topic(TopicKind::Touch),
            heartbeat: topic(TopicKind::Heartbeat),
            color: topic(TopicKind::Color),
            pattern: topic(TopicKind::Pattern),
            status: topic(TopicKind::Status),
        }
    }

    /// Pairing identity these topics were derived from.
    pub fn pairing(&self) -> &PairingId {
        &self.pairing
    }

    /// Topic name for `kind`.
    pub fn get(&self, kind: TopicKind) -> &str {
        match kind {
            TopicKind::Touch => &self.touch,
            TopicKind::Heartbeat => &self.heartbeat,
            TopicKind::Color => &self.color,
            TopicKind::Pattern => &self.pattern,
            TopicKind::Status => &self.status,
        }
    }

    /// All five topic names, in subscription order.
    pub fn all(&self) -> Vec<String> {
        TopicKind::ALL.iter().map(|kind| self.get(*kind).to_string()).collect()
    }

    /// Multi-level wildcard covering every topic of this pair.
    pub fn wildcard(&self) -> String {
        format!("{TOPIC_PREFIX}/{}/#", self.pairing)
    }

    /// Map an inbound topic back to its kind.
    ///
    /// Returns `None` for topics belonging to another pair or an unknown leaf.
    pub fn classify(&self, topic: &str) -> Option<TopicKind> {
        TopicKind::ALL.into_iter().find(|kind| self.get(*kind) == topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_identity_topics() {
        let topics = TopicSet::derive(&PairingId::new("demo"));

        assert_eq!(topics.get(TopicKind::Touch), "pico_whale/demo/touch");
        assert_eq!(topics.get(TopicKind::Heartbeat), "pico_whale/demo/heartbeat");
        assert_eq!(topics.get(TopicKind::Color), "pico_whale/demo/color");
        assert_eq!(topics.get(TopicKind::Pattern), "pico_whale/demo/pattern");
        assert_eq!(topics.get(TopicKind::Status), "pico_whale/demo/status");
    }

    #[test]
    fn all_topics_are_unique() {
        let topics = TopicSet::derive(&PairingId::new("whale_pair_jeff_friend"));
        let mut names = topics.all();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn derive_is_deterministic() {
        let id = PairingId::new("demo");
        assert_eq!(TopicSet::derive(&id), TopicSet::derive(&id));
    }

    #[test]
    fn classify_round_trips_every_kind() {
        let topics = TopicSet::derive(&PairingId::new("demo"));
        for kind in TopicKind::ALL {
            assert_eq!(topics.classify(topics.get(kind)), Some(kind));
        }
    }

    #[test]
    fn classify_rejects_foreign_topics() {
        let topics = TopicSet::derive(&PairingId::new("demo"));
        assert_eq!(topics.classify("pico_whale/other/touch"), None);
        assert_eq!(topics.classify("pico_whale/demo/unknown"), None);
        assert_eq!(topics.classify(""), None);
    }

    #[test]
    fn wildcard_covers_pair() {
        let topics = TopicSet::derive(&PairingId::new("demo"));
        assert_eq!(topics.wildcard(), "pico_whale/demo/#");
    }
}
