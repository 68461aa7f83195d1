//! Replacement instructions for native text runs
//!
//! An [`EditRecord`] exists only for runs the user actually changed. Partial
//! updates arrive as an [`EditPatch`] and are merged with a single
//! three-tier rule (see [`resolve_field`]).

use crate::color::Color;
use crate::run::RunId;
use crate::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Keyword font weights accepted by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightKeyword {
    Normal,
    Bold,
    Bolder,
    Lighter,
}

/// CSS-style font weight: a keyword or a number (100-900).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontWeight {
    Numeric(u16),
    Keyword(WeightKeyword),
}

impl FontWeight {
    pub const NORMAL: FontWeight = FontWeight::Keyword(WeightKeyword::Normal);
    pub const BOLD: FontWeight = FontWeight::Keyword(WeightKeyword::Bold);

    pub fn is_bold(&self) -> bool {
        match self {
            FontWeight::Numeric(value) => *value >= 700,
            FontWeight::Keyword(WeightKeyword::Bold | WeightKeyword::Bolder) => true,
            FontWeight::Keyword(_) => false,
        }
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl FromStr for FontWeight {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        if let Ok(number) = value.parse::<u16>() {
            return Ok(FontWeight::Numeric(number));
        }
        match value.as_str() {
            "normal" | "regular" => Ok(FontWeight::NORMAL),
            "bold" => Ok(FontWeight::BOLD),
            "bolder" => Ok(FontWeight::Keyword(WeightKeyword::Bolder)),
            "lighter" => Ok(FontWeight::Keyword(WeightKeyword::Lighter)),
            _ => Err(ModelError::InvalidFontWeight(s.to_owned())),
        }
    }
}

impl fmt::Display for FontWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontWeight::Numeric(value) => write!(f, "{value}"),
            FontWeight::Keyword(WeightKeyword::Normal) => f.write_str("normal"),
            FontWeight::Keyword(WeightKeyword::Bold) => f.write_str("bold"),
            FontWeight::Keyword(WeightKeyword::Bolder) => f.write_str("bolder"),
            FontWeight::Keyword(WeightKeyword::Lighter) => f.write_str("lighter"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    pub fn is_italic(&self) -> bool {
        !matches!(self, FontStyle::Normal)
    }
}

impl FromStr for FontStyle {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(FontStyle::Normal),
            "italic" => Ok(FontStyle::Italic),
            "oblique" => Ok(FontStyle::Oblique),
            _ => Err(ModelError::InvalidFontStyle(s.to_owned())),
        }
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FontStyle::Normal => "normal",
            FontStyle::Italic => "italic",
            FontStyle::Oblique => "oblique",
        })
    }
}

/// One field of a partial update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldUpdate<T> {
    /// Leave the stored value alone
    Keep,
    Set(T),
    /// Drop the stored value; reconciliation inherits from the original run
    Clear,
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T> FieldUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            FieldUpdate::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        value.map(FieldUpdate::Set).unwrap_or(FieldUpdate::Keep)
    }
}

/// Merge one field: explicit update, then stored value, then default.
pub fn resolve_field<T: Clone>(
    update: &FieldUpdate<T>,
    stored: Option<&T>,
    default: Option<T>,
) -> Option<T> {
    match update {
        FieldUpdate::Set(value) => Some(value.clone()),
        FieldUpdate::Clear => None,
        FieldUpdate::Keep => stored.cloned().or(default),
    }
}

/// Colors inferred from the rendered page for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampledColors {
    pub background: Color,
    pub foreground: Color,
}

/// Partial edit as produced by the inline editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditPatch {
    pub text: Option<String>,
    pub color: FieldUpdate<Color>,
    pub background: FieldUpdate<Color>,
    pub font_size: FieldUpdate<f32>,
    pub font_family: FieldUpdate<String>,
    pub font_weight: FieldUpdate<FontWeight>,
    pub font_style: FieldUpdate<FontStyle>,
}

impl EditPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = FieldUpdate::Set(color);
        self
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = FieldUpdate::Set(background);
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = FieldUpdate::Set(size);
        self
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = FieldUpdate::Set(family.into());
        self
    }

    pub fn with_font_weight(mut self, weight: FontWeight) -> Self {
        self.font_weight = FieldUpdate::Set(weight);
        self
    }

    pub fn with_font_style(mut self, style: FontStyle) -> Self {
        self.font_style = FieldUpdate::Set(style);
        self
    }

    /// A patch that drops every optional field.
    pub fn clear_all() -> Self {
        Self {
            text: None,
            color: FieldUpdate::Clear,
            background: FieldUpdate::Clear,
            font_size: FieldUpdate::Clear,
            font_family: FieldUpdate::Clear,
            font_weight: FieldUpdate::Clear,
            font_style: FieldUpdate::Clear,
        }
    }
}

/// Replacement instructions for one native run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRecord {
    pub run_id: RunId,
    pub text: String,
    #[serde(default)]
    pub color: Option<Color>,
    /// `None` masks with opaque white
    #[serde(default)]
    pub background: Option<Color>,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_weight: Option<FontWeight>,
    #[serde(default)]
    pub font_style: Option<FontStyle>,
}

impl EditRecord {
    /// Font size to draw with, inheriting the run height.
    pub fn effective_font_size(&self, run_height: f32) -> f32 {
        self.font_size.filter(|size| *size > 0.0).unwrap_or(run_height)
    }

    pub fn effective_color(&self) -> Color {
        self.color.unwrap_or(Color::BLACK)
    }

    pub fn mask_color(&self) -> Color {
        self.background.unwrap_or(Color::WHITE)
    }
}

/// What a merge did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Created,
    Updated,
    /// Nothing differed from the original; no record was created
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_boldness() {
        assert!(FontWeight::BOLD.is_bold());
        assert!(FontWeight::Numeric(700).is_bold());
        assert!(FontWeight::Numeric(800).is_bold());
        assert!(!FontWeight::Numeric(600).is_bold());
        assert!(!FontWeight::NORMAL.is_bold());
    }

    #[test]
    fn weight_parses_numbers_and_keywords() {
        assert_eq!("700".parse::<FontWeight>().unwrap(), FontWeight::Numeric(700));
        assert_eq!("Bold".parse::<FontWeight>().unwrap(), FontWeight::BOLD);
        assert!("heavy-ish".parse::<FontWeight>().is_err());
    }

    #[test]
    fn weight_serde_accepts_both_forms() {
        let numeric: FontWeight = serde_json::from_str("800").unwrap();
        let keyword: FontWeight = serde_json::from_str("\"bold\"").unwrap();

        assert_eq!(numeric, FontWeight::Numeric(800));
        assert_eq!(keyword, FontWeight::BOLD);
    }

    #[test]
    fn three_tier_resolution() {
        let stored = 14.0;

        assert_eq!(resolve_field(&FieldUpdate::Set(20.0), Some(&stored), Some(12.0)), Some(20.0));
        assert_eq!(resolve_field(&FieldUpdate::Keep, Some(&stored), Some(12.0)), Some(14.0));
        assert_eq!(resolve_field(&FieldUpdate::Keep, None, Some(12.0)), Some(12.0));
        assert_eq!(resolve_field::<f32>(&FieldUpdate::Clear, Some(&stored), Some(12.0)), None);
    }

    #[test]
    fn record_fallbacks() {
        let record = EditRecord {
            run_id: RunId::new(0, 0),
            text: "x".to_owned(),
            color: None,
            background: None,
            font_size: None,
            font_family: None,
            font_weight: None,
            font_style: None,
        };

        assert_eq!(record.effective_font_size(11.0), 11.0);
        assert_eq!(record.effective_color(), Color::BLACK);
        assert_eq!(record.mask_color(), Color::WHITE);
    }

    #[test]
    fn patch_deserializes_with_defaults() {
        let patch: EditPatch =
            serde_json::from_str(r##"{"text":"Hi","color":{"set":"#ff0000"},"font_size":"clear"}"##)
                .unwrap();

        assert_eq!(patch.text.as_deref(), Some("Hi"));
        assert_eq!(patch.color, FieldUpdate::Set(Color::rgb(255, 0, 0)));
        assert_eq!(patch.font_size, FieldUpdate::Clear);
        assert!(patch.font_family.is_keep());
    }
}
