//! Peer identities.

use std::{fmt, str::FromStr};

use crate::errors::DecodeError;

/// One of the two whales in a pair.
///
/// Devices publish as `whale_1` / `whale_2`. The `peer_1` / `peer_2` spellings
/// are accepted when decoding so that generic tooling can address the pair
/// without knowing the device names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum PeerId {
    /// First whale
    Whale1,
    /// Second whale
    Whale2,
}

impl PeerId {
    /// Both peers, in display order.
    pub const ALL: [Self; 2] = [Self::Whale1, Self::Whale2];

    /// Canonical wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Whale1 => "whale_1",
            Self::Whale2 => "whale_2",
        }
    }

    /// The paired peer. A touch on one whale makes the other respond.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Whale1 => Self::Whale2,
            Self::Whale2 => Self::Whale1,
        }
    }

    /// Position in [`PeerId::ALL`], for fixed-size per-peer arrays.
    pub const fn index(self) -> usize {
        match self {
            Self::Whale1 => 0,
            Self::Whale2 => 1,
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeerId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whale_1" | "peer_1" => Ok(Self::Whale1),
            "whale_2" | "peer_2" => Ok(Self::Whale2),
            other => Err(DecodeError::UnknownPeer(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_is_an_involution() {
        for peer in PeerId::ALL {
            assert_ne!(peer.other(), peer);
            assert_eq!(peer.other().other(), peer);
        }
    }

    #[test]
    fn parses_wire_names_and_aliases() {
        assert_eq!("whale_1".parse::<PeerId>(), Ok(PeerId::Whale1));
        assert_eq!("whale_2".parse::<PeerId>(), Ok(PeerId::Whale2));
        assert_eq!("peer_1".parse::<PeerId>(), Ok(PeerId::Whale1));
        assert_eq!("peer_2".parse::<PeerId>(), Ok(PeerId::Whale2));
    }

    #[test]
    fn rejects_unknown_and_empty() {
        assert!(matches!("whale_3".parse::<PeerId>(), Err(DecodeError::UnknownPeer(_))));
        assert!(matches!("".parse::<PeerId>(), Err(DecodeError::UnknownPeer(_))));
        assert!(matches!("WHALE_1".parse::<PeerId>(), Err(DecodeError::UnknownPeer(_))));
    }

    #[test]
    fn display_uses_wire_name() {
        assert_eq!(PeerId::Whale1.to_string(), "whale_1");
        assert_eq!(PeerId::Whale2.to_string(), "whale_2");
    }
}
