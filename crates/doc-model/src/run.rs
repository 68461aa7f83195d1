//! Geometry model: native text runs detected in the source document
//!
//! Runs are built once per loaded document from the text-extraction output
//! and never change afterwards. Edits refer to them by [`RunId`].

use crate::geometry::{PagePoint, PageSize, Rect};
use crate::ModelError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Extra reach around a run's box when hit testing pointer input (points).
pub const HIT_SLOP_PT: f32 = 10.0;

/// Identifier of a run, unique within the document: `n_p{page}_{index}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId {
    pub page: u32,
    pub index: u32,
}

impl RunId {
    pub fn new(page: u32, index: u32) -> Self {
        Self { page, index }
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n_p{}_{}", self.page, self.index)
    }
}

impl FromStr for RunId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidRunId(s.to_owned());
        let rest = s.strip_prefix("n_p").ok_or_else(invalid)?;
        let (page, index) = rest.split_once('_').ok_or_else(invalid)?;

        Ok(Self {
            page: page.parse().map_err(|_| invalid())?,
            index: index.parse().map_err(|_| invalid())?,
        })
    }
}

impl Serialize for RunId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One item as reported by a text-extraction facility.
///
/// `transform` is the 2D affine matrix `[a, b, c, d, e, f]`
/// (scale-x, skew-y, skew-x, scale-y, translate-x, translate-y).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTextItem {
    pub text: String,
    pub transform: Vec<f32>,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub font_name: Option<String>,
}

/// A native glyph run in page space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub id: RunId,
    pub page_index: u32,
    /// Bottom-left corner (baseline origin) in points
    pub x: f32,
    pub y: f32,
    pub width: f32,
    /// Approximates the font size
    pub height: f32,
    pub text: String,
    /// Font name as embedded in the source document, free-form
    pub font_name: String,
}

impl TextRun {
    /// Build a run from one extraction item. Never fails; malformed fields
    /// fall back to zero.
    pub fn from_raw(page_index: u32, index: u32, item: &RawTextItem) -> Self {
        let component = |i: usize| item.transform.get(i).copied().filter(|v| v.is_finite());
        let finite = |value: Option<f32>| value.filter(|v| v.is_finite() && *v > 0.0);

        let height = finite(item.height).unwrap_or_else(|| {
            let a = component(0).unwrap_or(0.0);
            let b = component(1).unwrap_or(0.0);
            a.hypot(b)
        });

        Self {
            id: RunId::new(page_index, index),
            page_index,
            x: component(4).unwrap_or(0.0),
            y: component(5).unwrap_or(0.0),
            width: finite(item.width).unwrap_or(0.0),
            height,
            text: item.text.clone(),
            font_name: item.font_name.clone().unwrap_or_default(),
        }
    }

    pub fn bbox(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Runs and size of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub index: u32,
    pub size: PageSize,
    pub runs: Vec<TextRun>,
}

impl PageGeometry {
    pub fn from_items(index: u32, size: PageSize, items: &[RawTextItem]) -> Self {
        let runs = items
            .iter()
            .enumerate()
            .map(|(i, item)| TextRun::from_raw(index, i as u32, item))
            .collect();

        Self { index, size, runs }
    }
}

/// Per-document collection of text runs, populated once at load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryModel {
    pages: Vec<PageGeometry>,
}

impl GeometryModel {
    pub fn new(pages: Vec<PageGeometry>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[PageGeometry] {
        &self.pages
    }

    pub fn page(&self, index: u32) -> Option<&PageGeometry> {
        self.pages.get(index as usize)
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn page_size(&self, index: u32) -> Option<PageSize> {
        self.page(index).map(|page| page.size)
    }

    pub fn run(&self, id: &RunId) -> Option<&TextRun> {
        self.page(id.page)?.runs.get(id.index as usize)
    }

    pub fn runs_on(&self, page: u32) -> &[TextRun] {
        self.page(page).map(|p| p.runs.as_slice()).unwrap_or(&[])
    }

    /// First run on `page` whose box, grown by [`HIT_SLOP_PT`], contains `point`.
    pub fn hit_test(&self, page: u32, point: PagePoint) -> Option<&TextRun> {
        self.runs_on(page).iter().find(|run| run.bbox().expand(HIT_SLOP_PT).contains_point(&point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, transform: Vec<f32>) -> RawTextItem {
        RawTextItem {
            text: text.to_owned(),
            transform,
            width: Some(50.0),
            height: None,
            font_name: Some("Helvetica".to_owned()),
        }
    }

    #[test]
    fn run_id_formats_and_parses() {
        let id = RunId::new(0, 3);
        assert_eq!(id.to_string(), "n_p0_3");
        assert_eq!("n_p12_7".parse::<RunId>().unwrap(), RunId::new(12, 7));
        assert!("p0_3".parse::<RunId>().is_err());
        assert!("n_p0".parse::<RunId>().is_err());
        assert!("n_px_1".parse::<RunId>().is_err());
    }

    #[test]
    fn position_comes_from_translation() {
        let run = TextRun::from_raw(0, 0, &item("Hello", vec![12.0, 0.0, 0.0, 12.0, 100.0, 700.0]));

        assert_eq!(run.x, 100.0);
        assert_eq!(run.y, 700.0);
        assert_eq!(run.width, 50.0);
        assert_eq!(run.id.to_string(), "n_p0_0");
    }

    #[test]
    fn height_falls_back_to_transform_norm() {
        let run = TextRun::from_raw(0, 0, &item("x", vec![3.0, 4.0, -4.0, 3.0, 0.0, 0.0]));
        assert!((run.height - 5.0).abs() < 1e-6);

        let mut declared = item("x", vec![3.0, 4.0, -4.0, 3.0, 0.0, 0.0]);
        declared.height = Some(9.0);
        assert_eq!(TextRun::from_raw(0, 0, &declared).height, 9.0);
    }

    #[test]
    fn malformed_items_get_defaults() {
        let raw = RawTextItem {
            text: "?".to_owned(),
            transform: vec![f32::NAN],
            width: Some(f32::INFINITY),
            height: None,
            font_name: None,
        };

        let run = TextRun::from_raw(2, 5, &raw);

        assert_eq!((run.x, run.y, run.width, run.height), (0.0, 0.0, 0.0, 0.0));
        assert_eq!(run.font_name, "");
        assert_eq!(run.id, RunId::new(2, 5));
    }

    #[test]
    fn hit_test_allows_slop() {
        let page = PageGeometry::from_items(
            0,
            PageSize::default(),
            &[item("Hello", vec![12.0, 0.0, 0.0, 12.0, 100.0, 700.0])],
        );
        let model = GeometryModel::new(vec![page]);

        assert!(model.hit_test(0, PagePoint::new(95.0, 705.0)).is_some());
        assert!(model.hit_test(0, PagePoint::new(160.0, 720.0)).is_some());
        assert!(model.hit_test(0, PagePoint::new(300.0, 705.0)).is_none());
        assert!(model.hit_test(1, PagePoint::new(100.0, 705.0)).is_none());
    }

    #[test]
    fn run_lookup_by_id() {
        let page = PageGeometry::from_items(
            0,
            PageSize::default(),
            &[item("a", vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]), item("b", vec![])],
        );
        let model = GeometryModel::new(vec![page]);

        assert_eq!(model.run(&RunId::new(0, 1)).map(|r| r.text.as_str()), Some("b"));
        assert!(model.run(&RunId::new(0, 2)).is_none());
        assert!(model.run(&RunId::new(3, 0)).is_none());
    }
}
