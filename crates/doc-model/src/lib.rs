//! Document edit model
//!
//! Pure data: native text-run geometry, the edit ledger and the overlay
//! content a user adds. All coordinates are stored in page space
//! (bottom-left origin, points); conversions happen in the constructors.

pub mod color;
pub mod edit;
pub mod geometry;
pub mod ledger;
pub mod overlay;
pub mod run;
pub mod viewport;

pub use color::Color;
pub use edit::{
    resolve_field, EditOutcome, EditPatch, EditRecord, FieldUpdate, FontStyle, FontWeight, SampledColors,
    WeightKeyword,
};
pub use geometry::{PagePoint, PageSize, PercentPoint, Rect};
pub use ledger::EditLedger;
pub use overlay::{
    AddedTextRun, DrawMode, DrawingPath, OverlayText, PercentText, StrokeSettings, StrokeStyle, TopLeftText,
    DEFAULT_BASELINE_RATIO, DEFAULT_OVERLAY_FONT_SIZE,
};
pub use run::{GeometryModel, PageGeometry, RawTextItem, RunId, TextRun, HIT_SLOP_PT};
pub use viewport::{apply_viewport_action, ScreenPoint, Viewport, ViewportAction};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid color: {0:?}")]
    InvalidColor(String),
    #[error("invalid run id: {0:?}")]
    InvalidRunId(String),
    #[error("invalid font weight: {0:?}")]
    InvalidFontWeight(String),
    #[error("invalid font style: {0:?}")]
    InvalidFontStyle(String),
}
