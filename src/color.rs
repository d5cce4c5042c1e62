//! Participant colors.
//!
//! Colors travel as `"#rrggbb"` strings on the wire.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Palette used when the host does not pick a color.
const PALETTE: [Rgb; 8] = [
    Rgb::new(0xe5, 0x39, 0x35),
    Rgb::new(0x1e, 0x88, 0xe5),
    Rgb::new(0x43, 0xa0, 0x47),
    Rgb::new(0xfb, 0x8c, 0x00),
    Rgb::new(0x8e, 0x24, 0xaa),
    Rgb::new(0x00, 0xac, 0xc1),
    Rgb::new(0xd8, 0x1b, 0x60),
    Rgb::new(0x6d, 0x4c, 0x41),
];

// ============================================================================
// Rgb
// ============================================================================

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Creates a color.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Picks a palette color from a seed (e.g. a participant id).
    #[must_use]
    pub fn from_seed(seed: &str) -> Self {
        let hash = seed
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        PALETTE[hash as usize % PALETTE.len()]
    }

    /// Formats as `#rrggbb`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        PALETTE[0]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| Error::protocol(format!("color must start with '#': {s}")))?;

        if hex.len() != 6 || !hex.is_ascii() {
            return Err(Error::protocol(format!("color must be #rrggbb: {s}")));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| Error::protocol(format!("invalid hex color: {s}")))
        };

        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> StdResult<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> StdResult<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================
