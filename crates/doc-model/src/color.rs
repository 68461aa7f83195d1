//! RGB color handling
//!
//! Colors travel through the editor as `#rrggbb` strings; internally they are
//! plain 8-bit channels.

use crate::ModelError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Luma weights used for perceptual contrast (ITU-R BT.601).
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`, `rrggbb` or the short `#rgb` form.
    pub fn from_hex(value: &str) -> Result<Self, ModelError> {
        let hex = value.trim().trim_start_matches('#');
        let invalid = || ModelError::InvalidColor(value.to_owned());

        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_owned(),
            _ => return Err(invalid()),
        };

        let channel = |range: std::ops::Range<usize>| {
            expanded.get(range).and_then(|s| u8::from_str_radix(s, 16).ok()).ok_or_else(invalid)
        };

        Ok(Self { r: channel(0..2)?, g: channel(2..4)?, b: channel(4..6)? })
    }

    /// Parse a background value where `transparent` (or empty) means "none".
    pub fn parse_optional(value: &str) -> Result<Option<Self>, ModelError> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("transparent") {
            return Ok(None);
        }
        Self::from_hex(trimmed).map(Some)
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Channels normalized to 0.0..=1.0, the form content streams expect.
    pub fn to_normalized(&self) -> (f32, f32, f32) {
        (self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0)
    }

    /// Luma-weighted absolute channel distance.
    pub fn weighted_contrast(&self, other: &Color) -> f32 {
        let dr = (self.r as f32 - other.r as f32).abs();
        let dg = (self.g as f32 - other.g as f32).abs();
        let db = (self.b as f32 - other.b as f32).abs();
        dr * LUMA_WEIGHTS[0] + dg * LUMA_WEIGHTS[1] + db * LUMA_WEIGHTS[2]
    }

    /// Mean of the three channels.
    pub fn brightness(&self) -> f32 {
        (self.r as f32 + self.g as f32 + self.b as f32) / 3.0
    }

    /// Black or white, whichever reads better on top of `self`.
    pub fn contrasting(&self) -> Color {
        if self.brightness() > 128.0 {
            Color::BLACK
        } else {
            Color::WHITE
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Color::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(Color::from_hex("#ff0000").unwrap(), Color::rgb(255, 0, 0));
        assert_eq!(Color::from_hex("00FF7f").unwrap(), Color::rgb(0, 255, 127));
        assert_eq!(Color::from_hex("#abc").unwrap(), Color::rgb(0xaa, 0xbb, 0xcc));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Color::from_hex("#12").is_err());
        assert!(Color::from_hex("#gg0000").is_err());
        assert!(Color::from_hex("").is_err());
    }

    #[test]
    fn transparent_background_is_none() {
        assert_eq!(Color::parse_optional("transparent").unwrap(), None);
        assert_eq!(Color::parse_optional("").unwrap(), None);
        assert_eq!(Color::parse_optional("#ffffff").unwrap(), Some(Color::WHITE));
    }

    #[test]
    fn hex_output_is_lowercase() {
        assert_eq!(Color::rgb(0xAB, 0x01, 0xFF).to_hex(), "#ab01ff");
    }

    #[test]
    fn contrast_uses_luma_weights() {
        let red = Color::rgb(255, 0, 0);
        let green = Color::rgb(0, 255, 0);

        assert!(green.weighted_contrast(&Color::BLACK) > red.weighted_contrast(&Color::BLACK));
        assert!((red.weighted_contrast(&Color::BLACK) - 255.0 * 0.299).abs() < 1e-3);
    }

    #[test]
    fn contrasting_picks_black_on_light() {
        assert_eq!(Color::WHITE.contrasting(), Color::BLACK);
        assert_eq!(Color::rgb(20, 20, 40).contrasting(), Color::WHITE);
    }

    #[test]
    fn serializes_as_hex_string() {
        let json = serde_json::to_string(&Color::rgb(255, 0, 0)).unwrap();
        assert_eq!(json, "\"#ff0000\"");

        let back: Color = serde_json::from_str("\"#00ff00\"").unwrap();
        assert_eq!(back, Color::rgb(0, 255, 0));
    }
}
