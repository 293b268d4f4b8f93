//! Named light patterns.

use std::{fmt, str::FromStr};

use crate::errors::DecodeError;

/// A lighting mode shared across the pair.
///
/// Sent on the wire as the bare name. `Off` is the sentinel for "lights off".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Pattern {
    /// Lights off
    Off,
    /// Steady color
    Solid,
    /// Dim idle glow
    Idle,
    /// Pulsing brightness
    #[default]
    Pulse,
    /// Slow breathing glow
    Breathing,
    /// Rainbow around the ring
    Rainbow,
    /// Wave travelling around the ring
    Wave,
    /// Random white sparkles
    Sparkle,
    /// Comet with a fading tail
    Comet,
    /// Alternating cells
    Alternate,
    /// Flickering fire
    Fire,
    /// Blue-green ocean waves
    Ocean,
    /// On/off flashing
    Flash,
    /// Random celebration colors
    Celebration,
}

impl Pattern {
    /// Every known pattern.
    pub const ALL: [Self; 14] = [
        Self::Off,
        Self::Solid,
        Self::Idle,
        Self::Pulse,
        Self::Breathing,
        Self::Rainbow,
        Self::Wave,
        Self::Sparkle,
        Self::Comet,
        Self::Alternate,
        Self::Fire,
        Self::Ocean,
        Self::Flash,
        Self::Celebration,
    ];

    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Solid => "solid",
            Self::Idle => "idle",
            Self::Pulse => "pulse",
            Self::Breathing => "breathing",
            Self::Rainbow => "rainbow",
            Self::Wave => "wave",
            Self::Sparkle => "sparkle",
            Self::Comet => "comet",
            Self::Alternate => "alternate",
            Self::Fire => "fire",
            Self::Ocean => "ocean",
            Self::Flash => "flash",
            Self::Celebration => "celebration",
        }
    }

    /// Decode a pattern payload. The payload is the name verbatim.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        payload.parse()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|pattern| pattern.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownPattern(s.to_string()))
    }
}
