//! Edit scripts: a batch of UI interactions as JSON.
//!
//! ```json
//! {
//!   "edits": [{ "run": "n_p0_0", "text": "Goodbye", "color": "#ff0000" }],
//!   "added_texts": [{ "page_index": 0, "text": "Note", "x": 72, "y": 72, "font_size": 14 }],
//!   "overlays": [{ "page_index": 0, "text": "DRAFT", "x_pct": 50, "y_pct": 10 }],
//!   "strokes": [{ "page_index": 0, "points": [{ "x": 10, "y": 10 }, { "x": 20, "y": 20 }] }]
//! }
//! ```
//!
//! Every coordinate uses the convention of the tool that produced it; the
//! session normalizes them.

use crate::error::SessionError;
use crate::session::EditSession;
use doc_model::{
    Color, DrawMode, EditOutcome, EditPatch, FontStyle, FontWeight, PercentPoint, PercentText, RunId,
    StrokeSettings, StrokeStyle, TopLeftText,
};
use pdf_engine::PdfEngine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditScript {
    pub edits: Vec<ScriptEdit>,
    pub added_texts: Vec<TopLeftText>,
    pub overlays: Vec<PercentText>,
    pub strokes: Vec<ScriptStroke>,
}

/// An inline edit of one native run. Absent fields are left alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEdit {
    pub run: RunId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub color: Option<Color>,
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
    /// Sample colors from the page before merging, as opening the editor does
    #[serde(default = "default_true")]
    pub sample: bool,
}

fn default_true() -> bool {
    true
}

impl ScriptEdit {
    pub fn to_patch(&self) -> EditPatch {
        EditPatch {
            text: self.text.clone(),
            color: self.color.into(),
            background: self.background.into(),
            font_size: self.font_size.into(),
            font_family: self.font_family.clone().into(),
            font_weight: self.font_weight.into(),
            font_style: self.font_style.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStroke {
    pub page_index: u32,
    /// Percent of the page, top-left origin
    pub points: Vec<PercentPoint>,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default)]
    pub style: StrokeStyle,
    #[serde(default)]
    pub mode: DrawMode,
}

impl ScriptStroke {
    pub fn settings(&self) -> StrokeSettings {
        let defaults = StrokeSettings::default();
        StrokeSettings {
            color: self.color.unwrap_or(defaults.color),
            width: self.width.unwrap_or(defaults.width),
            opacity: self.opacity.unwrap_or(defaults.opacity),
            style: self.style,
            mode: self.mode,
        }
    }
}

/// Tally of a script application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScriptSummary {
    pub edits_created: usize,
    pub edits_updated: usize,
    pub edits_unchanged: usize,
    pub texts_added: usize,
    pub overlays_added: usize,
    pub strokes_added: usize,
}

impl EditScript {
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, SessionError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Replay the script against `session`. Stops at the first invalid entry.
    pub fn apply<E: PdfEngine>(&self, session: &mut EditSession<E>) -> Result<ScriptSummary, SessionError> {
        let mut summary = ScriptSummary::default();

        for edit in &self.edits {
            if edit.sample {
                session.begin_edit(&edit.run)?;
            }
            match session.commit_edit(&edit.run, edit.to_patch())? {
                EditOutcome::Created => summary.edits_created += 1,
                EditOutcome::Updated => summary.edits_updated += 1,
                EditOutcome::Unchanged => summary.edits_unchanged += 1,
            }
        }

        for text in &self.added_texts {
            session.add_text_top_left(text.clone())?;
            summary.texts_added += 1;
        }

        for overlay in &self.overlays {
            session.add_overlay_pct(overlay.clone())?;
            summary.overlays_added += 1;
        }

        for stroke in &self.strokes {
            session.append_stroke_pct(stroke.page_index, &stroke.points, stroke.settings())?;
            summary.strokes_added += 1;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use doc_model::FieldUpdate;
    use pdf_engine::fixtures;

    fn session() -> EditSession {
        EditSession::open_bytes(
            fixtures::single_run_pdf("Hello", 100.0, 700.0, 12.0),
            "hello.pdf",
            ExportConfig::default().with_web_fonts(false),
        )
        .unwrap()
    }

    const SCRIPT: &str = r##"{
        "edits": [
            { "run": "n_p0_0", "text": "Goodbye", "color": "#ff0000", "font_weight": "bold" }
        ],
        "added_texts": [
            { "page_index": 0, "text": "Note", "x": 72, "y": 72, "font_size": 14, "color": "#333333" }
        ],
        "overlays": [
            { "page_index": 0, "text": "DRAFT", "x_pct": 50, "y_pct": 10, "font_weight": 700 }
        ],
        "strokes": [
            { "page_index": 0, "points": [{ "x": 10, "y": 10 }, { "x": 20, "y": 20 }, { "x": 30, "y": 10 }],
              "color": "#0000ff", "style": "dashed" },
            { "page_index": 0, "points": [{ "x": 5, "y": 5 }], "mode": "eraser" }
        ]
    }"##;

    #[test]
    fn parses_sparse_entries() {
        let script = EditScript::from_json(SCRIPT).unwrap();

        let edit = &script.edits[0];
        assert!(edit.sample);
        let patch = edit.to_patch();
        assert_eq!(patch.color, FieldUpdate::Set(Color::rgb(255, 0, 0)));
        assert_eq!(patch.font_weight, FieldUpdate::Set(FontWeight::BOLD));
        assert!(patch.font_size.is_keep());
        assert_eq!(script.added_texts[0].font_weight, FontWeight::NORMAL);
        assert_eq!(script.overlays[0].font_weight, FontWeight::Numeric(700));
        assert_eq!(script.strokes[1].settings().mode, DrawMode::Eraser);
        assert_eq!(script.strokes[0].settings().width, 2.0);
    }

    #[test]
    fn empty_script_is_valid() {
        assert_eq!(EditScript::from_json("{}").unwrap(), EditScript::default());
        assert!(matches!(EditScript::from_json("{ \"edits\": 3 }"), Err(SessionError::Script(_))));
    }

    #[test]
    fn applies_and_exports() {
        let mut session = session();
        let script = EditScript::from_json(SCRIPT).unwrap();

        let summary = script.apply(&mut session).unwrap();
        assert_eq!(
            summary,
            ScriptSummary {
                edits_created: 1,
                edits_updated: 0,
                edits_unchanged: 0,
                texts_added: 1,
                overlays_added: 1,
                strokes_added: 2,
            }
        );

        let report = session.export(None).unwrap().report;
        assert_eq!(report.replaced_runs, 1);
        assert_eq!(report.added_texts, 1);
        assert_eq!(report.overlay_layers, 1);
        assert_eq!(report.line_segments, 2);
        assert_eq!(report.skipped_paths, 1);
    }

    #[test]
    fn unknown_run_stops_the_script() {
        let mut session = session();
        let script = EditScript::from_json(r#"{ "edits": [{ "run": "n_p0_9", "text": "x" }] }"#).unwrap();

        assert!(matches!(script.apply(&mut session), Err(SessionError::UnknownRun(_))));
    }
}
