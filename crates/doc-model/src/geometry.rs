//! Page-space geometry
//!
//! Every coordinate stored by the model uses the document convention:
//! - Origin (0, 0) at the bottom-left of the page
//! - X increases to the right, Y increases upward
//! - Units are points (1/72 inch)
//!
//! Inputs that arrive in other conventions (top-left pixels from a canvas,
//! percentage-of-page from the drawing overlay) are converted once, here,
//! when they enter the model.

use serde::{Deserialize, Serialize};

/// Page dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub const fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

/// A point in page space (bottom-left origin, points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Convert a top-left-origin point (points) into page space.
    pub fn from_top_left(x: f32, y_from_top: f32, page: PageSize) -> Self {
        Self { x, y: page.height_pt - y_from_top }
    }

    /// Convert a percentage-of-page point (0-100 on each axis, top-left
    /// origin) into page space.
    pub fn from_percent(point: PercentPoint, page: PageSize) -> Self {
        let x = (point.x / 100.0) * page.width_pt;
        let y_from_top = (point.y / 100.0) * page.height_pt;
        Self::from_top_left(x, y_from_top, page)
    }

    pub fn distance_to(&self, other: &PagePoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A point expressed as a percentage of the page, top-left origin.
///
/// Zoom independent; this is how the drawing overlay records pointer input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentPoint {
    pub x: f32,
    pub y: f32,
}

impl PercentPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in page space; (x, y) is the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f32) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains_point(&self, point: &PagePoint) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.top()
    }

    /// True when `other` lies entirely inside this rectangle.
    pub fn covers(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.top() <= self.top()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.right() < other.x
            || other.right() < self.x
            || self.top() < other.y
            || other.top() < self.y)
    }
}
