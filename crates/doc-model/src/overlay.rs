//! Content added on top of the document: vector text, percentage-anchored
//! text layers and freehand strokes.
//!
//! Each type has a constructor taking the caller's native convention (top-left
//! points, percentages). The stored form is always bottom-left page points.

use crate::color::Color;
use crate::edit::{FontStyle, FontWeight};
use crate::geometry::{PagePoint, PageSize, PercentPoint};
use serde::{Deserialize, Serialize};

/// Fraction of the font size between the top of a text box and its baseline.
///
/// A heuristic; the true offset is the font's ascent.
pub const DEFAULT_BASELINE_RATIO: f32 = 0.75;

/// Font size used for overlay layers that do not specify one.
pub const DEFAULT_OVERLAY_FONT_SIZE: f32 = 12.0;

/// Vector text as placed by the add-text tool: top-left origin, points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopLeftText {
    pub page_index: u32,
    pub text: String,
    pub x: f32,
    pub y: f32,
    /// Box width; used as the wrapping width when positive
    #[serde(default)]
    pub width: f32,
    pub font_size: f32,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub font_style: FontStyle,
    #[serde(default = "default_text_color")]
    pub color: Color,
    /// Multiplier of the font size
    #[serde(default)]
    pub line_height: Option<f32>,
}

fn default_text_color() -> Color {
    Color::BLACK
}

/// Text with no counterpart in the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedTextRun {
    pub id: u64,
    pub page_index: u32,
    pub text: String,
    /// Baseline origin of the first line
    pub baseline: PagePoint,
    pub max_width: Option<f32>,
    pub font_size: f32,
    pub font_family: Option<String>,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub color: Color,
    pub line_height: Option<f32>,
}

impl AddedTextRun {
    /// Normalize a top-left placement: `y = page_height - top - size * ratio`.
    pub fn from_top_left(id: u64, input: TopLeftText, page: PageSize, baseline_ratio: f32) -> Self {
        let baseline_y = page.height_pt - input.y - input.font_size * baseline_ratio;

        Self {
            id,
            page_index: input.page_index,
            text: input.text,
            baseline: PagePoint::new(input.x, baseline_y),
            max_width: Some(input.width).filter(|w| *w > 0.0),
            font_size: input.font_size,
            font_family: input.font_family,
            font_weight: input.font_weight,
            font_style: input.font_style,
            color: input.color,
            line_height: input.line_height.filter(|lh| *lh > 0.0),
        }
    }
}

/// A text layer anchored as a percentage of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentText {
    pub page_index: u32,
    pub text: String,
    pub x_pct: f32,
    pub y_pct: f32,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub font_style: FontStyle,
    #[serde(default = "default_text_color")]
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayText {
    pub id: u64,
    pub page_index: u32,
    pub text: String,
    pub anchor: PagePoint,
    pub font_size: f32,
    pub font_family: Option<String>,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub color: Color,
}

impl OverlayText {
    pub fn from_percent(id: u64, input: PercentText, page: PageSize, default_size: f32) -> Self {
        Self {
            id,
            page_index: input.page_index,
            text: input.text,
            anchor: PagePoint::from_percent(PercentPoint::new(input.x_pct, input.y_pct), page),
            font_size: input.font_size.filter(|s| *s > 0.0).unwrap_or(default_size),
            font_family: input.font_family,
            font_weight: input.font_weight,
            font_style: input.font_style,
            color: input.color,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    Neon,
}

impl StrokeStyle {
    /// Dash array for a stroke of `width`; empty for a continuous line.
    pub fn dash_pattern(&self, width: f32) -> Vec<f32> {
        match self {
            StrokeStyle::Dashed => vec![width * 2.0, width * 2.0],
            StrokeStyle::Dotted => vec![width, width],
            StrokeStyle::Solid | StrokeStyle::Neon => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    #[default]
    Brush,
    Eraser,
}

/// Brush settings captured when a stroke starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeSettings {
    pub color: Color,
    pub width: f32,
    pub opacity: f32,
    #[serde(default)]
    pub style: StrokeStyle,
    #[serde(default)]
    pub mode: DrawMode,
}

impl Default for StrokeSettings {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            width: 2.0,
            opacity: 1.0,
            style: StrokeStyle::Solid,
            mode: DrawMode::Brush,
        }
    }
}

/// A finished freehand stroke. Immutable once appended to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingPath {
    pub id: u64,
    pub page_index: u32,
    pub points: Vec<PagePoint>,
    pub color: Color,
    pub width: f32,
    pub opacity: f32,
    pub style: StrokeStyle,
    pub mode: DrawMode,
}

impl DrawingPath {
    pub fn from_percent(
        id: u64,
        page_index: u32,
        points: &[PercentPoint],
        page: PageSize,
        settings: StrokeSettings,
    ) -> Self {
        Self {
            id,
            page_index,
            points: points.iter().map(|p| PagePoint::from_percent(*p, page)).collect(),
            color: settings.color,
            width: settings.width,
            opacity: settings.opacity.clamp(0.0, 1.0),
            style: settings.style,
            mode: settings.mode,
        }
    }

    /// Consecutive point pairs; empty for paths with fewer than two points.
    pub fn segments(&self) -> impl Iterator<Item = (PagePoint, PagePoint)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement() -> TopLeftText {
        TopLeftText {
            page_index: 0,
            text: "Added".to_owned(),
            x: 72.0,
            y: 100.0,
            width: 0.0,
            font_size: 20.0,
            font_family: None,
            font_weight: FontWeight::NORMAL,
            font_style: FontStyle::Normal,
            color: Color::BLACK,
            line_height: None,
        }
    }

    #[test]
    fn added_text_baseline_uses_ratio() {
        let run = AddedTextRun::from_top_left(1, placement(), PageSize::new(612.0, 792.0), 0.75);

        assert_eq!(run.baseline, PagePoint::new(72.0, 792.0 - 100.0 - 15.0));
        assert_eq!(run.max_width, None);
    }

    #[test]
    fn added_text_keeps_positive_wrap_width() {
        let mut input = placement();
        input.width = 140.0;
        input.line_height = Some(1.16);

        let run = AddedTextRun::from_top_left(1, input, PageSize::default(), 0.75);

        assert_eq!(run.max_width, Some(140.0));
        assert_eq!(run.line_height, Some(1.16));
    }

    #[test]
    fn overlay_text_converts_percentages() {
        let input = PercentText {
            page_index: 0,
            text: "Stamp".to_owned(),
            x_pct: 10.0,
            y_pct: 50.0,
            font_size: None,
            font_family: None,
            font_weight: FontWeight::NORMAL,
            font_style: FontStyle::Normal,
            color: Color::BLACK,
        };

        let layer = OverlayText::from_percent(1, input, PageSize::new(600.0, 800.0), 12.0);

        assert_eq!(layer.anchor, PagePoint::new(60.0, 400.0));
        assert_eq!(layer.font_size, 12.0);
    }

    #[test]
    fn single_point_path_has_no_segments() {
        let path = DrawingPath::from_percent(
            1,
            0,
            &[PercentPoint::new(10.0, 10.0)],
            PageSize::default(),
            StrokeSettings::default(),
        );

        assert_eq!(path.segments().count(), 0);
    }

    #[test]
    fn path_segments_flip_y() {
        let page = PageSize::new(100.0, 200.0);
        let path = DrawingPath::from_percent(
            1,
            0,
            &[PercentPoint::new(0.0, 0.0), PercentPoint::new(50.0, 25.0), PercentPoint::new(100.0, 100.0)],
            page,
            StrokeSettings::default(),
        );

        let segments: Vec<_> = path.segments().collect();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], (PagePoint::new(0.0, 200.0), PagePoint::new(50.0, 150.0)));
        assert_eq!(segments[1], (PagePoint::new(50.0, 150.0), PagePoint::new(100.0, 0.0)));
    }

    #[test]
    fn dash_patterns_scale_with_width() {
        assert_eq!(StrokeStyle::Dashed.dash_pattern(3.0), vec![6.0, 6.0]);
        assert_eq!(StrokeStyle::Dotted.dash_pattern(3.0), vec![3.0, 3.0]);
        assert!(StrokeStyle::Neon.dash_pattern(3.0).is_empty());
    }
}
