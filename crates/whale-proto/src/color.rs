//! Shared color and its `r,g,b` encoding.

use std::{fmt, str::FromStr};

use crate::errors::DecodeError;

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Rgb {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

/// Named presets offered by the control surface.
const PRESETS: [(&str, Rgb); 10] = [
    ("pink", Rgb::new(255, 100, 200)),
    ("cyan", Rgb::new(0, 212, 255)),
    ("green", Rgb::new(0, 255, 136)),
    ("orange", Rgb::new(255, 165, 0)),
    ("red", Rgb::new(255, 68, 68)),
    ("purple", Rgb::new(170, 0, 255)),
    ("white", Rgb::new(255, 255, 255)),
    ("warm_white", Rgb::new(255, 244, 229)),
    ("ocean", Rgb::new(0, 119, 190)),
    ("sunset", Rgb::new(255, 99, 71)),
];

impl Rgb {
    /// Color both whales start with.
    pub const DEFAULT_TOUCH: Self = Self::new(255, 100, 200);

    /// Dim blue shown by a ring that is not responding.
    pub const IDLE: Self = Self::new(0x11, 0x22, 0x33);

    /// All channels off.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Build a color from channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Look up a named preset.
    pub fn preset(name: &str) -> Option<Self> {
        PRESETS.iter().find(|(preset, _)| *preset == name).map(|(_, color)| *color)
    }

    /// Names of every preset.
    pub fn preset_names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|(name, _)| *name)
    }

    /// Scale every channel by `factor`, flooring the result.
    ///
    /// `factor` is clamped to `0.0..=1.0`.
    #[must_use]
    pub fn scale(self, factor: f64) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        let channel = |c: u8| (f64::from(c) * factor).floor() as u8;
        Self::new(channel(self.r), channel(self.g), channel(self.b))
    }

    /// Parse `#rrggbb` (leading `#` optional, case-insensitive).
    pub fn from_hex(hex: &str) -> Result<Self, DecodeError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DecodeError::InvalidHex(hex.to_string()));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| DecodeError::InvalidHex(hex.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Format as lowercase `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Wire encoding: `r,g,b` in decimal.
    pub fn encode(self) -> String {
        self.to_string()
    }

    /// Decode the `r,g,b` wire form.
    ///
    /// Exactly three comma-separated decimal integers in `0..=255`, written
    /// without leading zeros, so a decoded payload always re-encodes to the same
    /// text. Nothing is trimmed or clamped; anything else is rejected.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        let parts: Vec<&str> = payload.split(',').collect();
        let [r, g, b] = parts.as_slice() else {
            return Err(DecodeError::ComponentCount(parts.len()));
        };
        Ok(Self::new(component(0, r)?, component(1, g)?, component(2, b)?))
    }
}

fn component(index: usize, raw: &str) -> Result<u8, DecodeError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::NotAnInteger { index, value: raw.to_string() });
    }
    if raw.len() > 1 && raw.starts_with('0') {
        return Err(DecodeError::LeadingZero { index, value: raw.to_string() });
    }
    // All digits, so the only parse failure left is overflow of u64.
    let value = raw.parse::<u64>().unwrap_or(u64::MAX);
    u8::try_from(value).map_err(|_| DecodeError::OutOfRange { index, value })
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = DecodeError;

    /// Accepts the wire form, `#rrggbb`, or a preset name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(color) = Self::preset(s) {
            return Ok(color);
        }
        if s.starts_with('#') {
            return Self::from_hex(s);
        }
        Self::decode(s)
    }
}
