//! Background and text color inference from a rendered page.
//!
//! Both reads are pure and never fail: pixels outside the raster are treated
//! as transparent, and a window with nothing opaque yields the default color.

use doc_model::{Color, PageSize, Rect, SampledColors};
use pdf_engine::RgbaImage;

/// Pixels between the background window and the run's top-left corner.
pub const BACKGROUND_INSET_PX: i64 = 4;
/// Side of the square background window.
pub const BACKGROUND_WINDOW_PX: u32 = 3;
pub const FOREGROUND_MAX_WIDTH_PX: u32 = 100;
pub const FOREGROUND_MAX_HEIGHT_PX: u32 = 50;
/// Pixels below this alpha do not count as text.
pub const FOREGROUND_MIN_ALPHA: u8 = 128;

/// A page raster plus the scale it was rendered at.
#[derive(Debug, Clone, Copy)]
pub struct RasterView<'a> {
    image: &'a RgbaImage,
    scale: f32,
    page: PageSize,
}

impl<'a> RasterView<'a> {
    pub fn new(image: &'a RgbaImage, scale: f32, page: PageSize) -> Self {
        Self { image, scale, page }
    }

    /// Raster column and row of the box's top-left corner.
    fn top_left_px(&self, bbox: &Rect) -> (i64, i64) {
        let x = (bbox.x * self.scale).floor() as i64;
        let y = ((self.page.height_pt - bbox.y - bbox.height) * self.scale).floor() as i64;
        (x, y)
    }

    fn pixel(&self, x: i64, y: i64) -> Option<[u8; 4]> {
        let x = u32::try_from(x).ok()?;
        let y = u32::try_from(y).ok()?;
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    fn window(&self, x: i64, y: i64, width: u32, height: u32) -> impl Iterator<Item = [u8; 4]> + '_ {
        (0..i64::from(height))
            .flat_map(move |dy| (0..i64::from(width)).map(move |dx| (x + dx, y + dy)))
            .filter_map(move |(px, py)| self.pixel(px, py))
    }

    /// Average of the opaque pixels just outside the box's top-left corner.
    pub fn sample_background(&self, bbox: &Rect) -> Color {
        let (x, y) = self.top_left_px(bbox);
        let x = (x - BACKGROUND_INSET_PX).max(0);
        let y = (y - BACKGROUND_INSET_PX).max(0);

        let mut sum = [0u32; 3];
        let mut count = 0u32;
        for [r, g, b, a] in self.window(x, y, BACKGROUND_WINDOW_PX, BACKGROUND_WINDOW_PX) {
            if a == 0 {
                continue;
            }
            sum[0] += u32::from(r);
            sum[1] += u32::from(g);
            sum[2] += u32::from(b);
            count += 1;
        }

        if count == 0 {
            return Color::WHITE;
        }
        let mean = |total: u32| (total as f32 / count as f32).round() as u8;
        Color::rgb(mean(sum[0]), mean(sum[1]), mean(sum[2]))
    }

    /// The opaque pixel inside the box that contrasts most with `background`.
    ///
    /// A box whose opaque pixels all match the background yields that color.
    /// Without any opaque pixel the result is black or white, whichever reads
    /// on the background.
    pub fn sample_foreground(&self, bbox: &Rect, background: Color) -> Color {
        let (x, y) = self.top_left_px(bbox);
        let width = ((bbox.width * self.scale).floor() as u32).clamp(1, FOREGROUND_MAX_WIDTH_PX);
        let height = ((bbox.height * self.scale).floor() as u32).clamp(1, FOREGROUND_MAX_HEIGHT_PX);

        let mut best = background.contrasting();
        let mut best_contrast = -1.0;
        for [r, g, b, a] in self.window(x.max(0), y.max(0), width, height) {
            if a < FOREGROUND_MIN_ALPHA {
                continue;
            }
            let candidate = Color::rgb(r, g, b);
            let contrast = candidate.weighted_contrast(&background);
            if contrast > best_contrast {
                best_contrast = contrast;
                best = candidate;
            }
        }
        best
    }

    pub fn sample(&self, bbox: &Rect) -> SampledColors {
        let background = self.sample_background(bbox);
        SampledColors { background, foreground: self.sample_foreground(bbox, background) }
    }
}
