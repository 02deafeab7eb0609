//! Hex colors as used by theme palettes (`#RRGGBB` / `#RRGGBBAA`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// 8-bit straight-alpha RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseColorError {
    #[error("color must start with '#': {0:?}")]
    MissingHash(String),

    #[error("color must have 6 or 8 hex digits: {0:?}")]
    BadLength(String),

    #[error("invalid hex digit in color: {0:?}")]
    BadDigit(String),
}

impl Rgba {
    pub const WHITE: Self = Self::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Self = Self::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub fn to_hex(self) -> String {
        if self.a == 0xff {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl FromStr for Rgba {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('#')
            .ok_or_else(|| ParseColorError::MissingHash(s.to_string()))?;
        if digits.len() != 6 && digits.len() != 8 {
            return Err(ParseColorError::BadLength(s.to_string()));
        }

        let channel = |i: usize| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| ParseColorError::BadDigit(s.to_string()))
        };

        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if digits.len() == 8 { channel(6)? } else { 0xff },
        })
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rgb() {
        let c: Rgba = "#1de9b6".parse().unwrap();
        assert_eq!(c, Rgba::rgb(0x1d, 0xe9, 0xb6));
    }

    #[test]
    fn parses_rgba() {
        let c: Rgba = "#ffffff80".parse().unwrap();
        assert_eq!(c.a, 0x80);
        assert_eq!(c.to_hex(), "#ffffff80");
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            "ffffff".parse::<Rgba>(),
            Err(ParseColorError::MissingHash(_))
        ));
        assert!(matches!(
            "#fff".parse::<Rgba>(),
            Err(ParseColorError::BadLength(_))
        ));
        assert!(matches!(
            "#gg0000".parse::<Rgba>(),
            Err(ParseColorError::BadDigit(_))
        ));
    }
}
