//! On-screen presentation state: pan offset and zoom.
//!
//! Screen space has its origin at the top-left of the editor surface, in
//! pixels; at scale 1.0 one point is one pixel. Nothing here is written into
//! an exported document.

use crate::geometry::{PagePoint, PageSize};
use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub pan_x: f32,
    pub pan_y: f32,
    pub scale: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, scale: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportAction {
    Pan { dx: f32, dy: f32 },
    ZoomAt { factor: f32, anchor: ScreenPoint },
    SetScale(f32),
    FitPage { container_width: f32, container_height: f32, page: PageSize, padding: f32 },
    Reset,
}

impl Viewport {
    pub fn with_scale(scale: f32) -> Self {
        Self { scale: clamp_scale(scale), ..Self::default() }
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    /// Multiply the scale by `factor`, keeping the content under `anchor` fixed.
    pub fn zoom_at(&mut self, factor: f32, anchor: ScreenPoint) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let next = clamp_scale(self.scale * factor);
        let ratio = next / self.scale;
        self.pan_x = anchor.x - (anchor.x - self.pan_x) * ratio;
        self.pan_y = anchor.y - (anchor.y - self.pan_y) * ratio;
        self.scale = next;
    }

    /// Scale the page to fit the container and center it.
    pub fn fit_page(&mut self, container_width: f32, container_height: f32, page: PageSize, padding: f32) {
        if page.width_pt <= 0.0 || page.height_pt <= 0.0 {
            return;
        }
        let available_w = (container_width - padding * 2.0).max(1.0);
        let available_h = (container_height - padding * 2.0).max(1.0);
        self.scale = clamp_scale((available_w / page.width_pt).min(available_h / page.height_pt));
        self.pan_x = (container_width - page.width_pt * self.scale) / 2.0;
        self.pan_y = (container_height - page.height_pt * self.scale) / 2.0;
    }

    pub fn screen_to_page(&self, point: ScreenPoint, page: PageSize) -> PagePoint {
        let x = (point.x - self.pan_x) / self.scale;
        let y_from_top = (point.y - self.pan_y) / self.scale;
        PagePoint::from_top_left(x, y_from_top, page)
    }

    pub fn page_to_screen(&self, point: PagePoint, page: PageSize) -> ScreenPoint {
        let y_from_top = page.height_pt - point.y;
        ScreenPoint {
            x: point.x * self.scale + self.pan_x,
            y: y_from_top * self.scale + self.pan_y,
        }
    }
}

fn clamp_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    } else {
        1.0
    }
}

pub fn apply_viewport_action(viewport: &mut Viewport, action: ViewportAction) {
    match action {
        ViewportAction::Pan { dx, dy } => viewport.pan_by(dx, dy),
        ViewportAction::ZoomAt { factor, anchor } => viewport.zoom_at(factor, anchor),
        ViewportAction::SetScale(scale) => viewport.scale = clamp_scale(scale),
        ViewportAction::FitPage { container_width, container_height, page, padding } => {
            viewport.fit_page(container_width, container_height, page, padding)
        }
        ViewportAction::Reset => *viewport = Viewport::default(),
    }
}
