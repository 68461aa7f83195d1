//! Edit ledger: every user change to a loaded document
//!
//! The ledger is the only mutable state that feeds reconciliation. It holds:
//! - one [`EditRecord`] per modified native run
//! - colors sampled for runs the user started editing
//! - added vector text, overlay text layers and freehand strokes
//!
//! It never touches the underlying document.

use crate::edit::{resolve_field, EditOutcome, EditPatch, EditRecord, FontStyle, FontWeight, SampledColors};
use crate::overlay::{AddedTextRun, DrawingPath, OverlayText};
use crate::run::{RunId, TextRun};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditLedger {
    #[serde(default)]
    edits: BTreeMap<RunId, EditRecord>,
    #[serde(default)]
    samples: BTreeMap<RunId, SampledColors>,
    #[serde(default)]
    added_texts: Vec<AddedTextRun>,
    #[serde(default)]
    overlays: Vec<OverlayText>,
    #[serde(default)]
    paths: Vec<DrawingPath>,
    #[serde(default)]
    next_id: u64,
}

impl EditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when reconciliation would leave the document untouched.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
            && self.added_texts.is_empty()
            && self.overlays.is_empty()
            && self.paths.is_empty()
    }

    /// Hand out an identifier for added text, overlays and strokes.
    pub fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn record_sample(&mut self, run_id: RunId, colors: SampledColors) {
        self.samples.insert(run_id, colors);
    }

    pub fn sampled(&self, run_id: &RunId) -> Option<SampledColors> {
        self.samples.get(run_id).copied()
    }

    /// Merge `patch` into the record for `run`, creating it if absent.
    ///
    /// Each field resolves as: explicit update, then the stored record, then
    /// (only when creating) the run height, the sampled colors, or `normal`
    /// weight and style. A new record whose fields all match those defaults
    /// is not created.
    pub fn set_edit(&mut self, run: &TextRun, patch: EditPatch) -> EditOutcome {
        let existing = self.edits.get(&run.id);
        let sampled = self.sampled(&run.id);
        let creating = existing.is_none();

        let defaults = (
            only_when(creating, sampled.map(|s| s.foreground)),
            only_when(creating, sampled.map(|s| s.background)),
            only_when(creating, Some(run.height).filter(|h| *h > 0.0)),
            only_when(creating, Some(FontWeight::NORMAL)),
            only_when(creating, Some(FontStyle::Normal)),
        );

        let record = EditRecord {
            run_id: run.id,
            text: patch
                .text
                .clone()
                .or_else(|| existing.map(|e| e.text.clone()))
                .unwrap_or_else(|| run.text.clone()),
            color: resolve_field(&patch.color, existing.and_then(|e| e.color.as_ref()), defaults.0),
            background: resolve_field(
                &patch.background,
                existing.and_then(|e| e.background.as_ref()),
                defaults.1,
            ),
            font_size: resolve_field(
                &patch.font_size,
                existing.and_then(|e| e.font_size.as_ref()),
                defaults.2,
            ),
            font_family: resolve_field(
                &patch.font_family,
                existing.and_then(|e| e.font_family.as_ref()),
                None,
            ),
            font_weight: resolve_field(
                &patch.font_weight,
                existing.and_then(|e| e.font_weight.as_ref()),
                defaults.3,
            ),
            font_style: resolve_field(
                &patch.font_style,
                existing.and_then(|e| e.font_style.as_ref()),
                defaults.4,
            ),
        };

        if creating {
            let unchanged = record.text == run.text
                && record.color == defaults.0
                && record.background == defaults.1
                && record.font_size == defaults.2
                && record.font_family.is_none()
                && record.font_weight.map_or(true, |w| !w.is_bold())
                && record.font_style.map_or(true, |s| !s.is_italic());
            if unchanged {
                debug!(run = %run.id, "edit matches original, no record created");
                return EditOutcome::Unchanged;
            }
        }

        debug!(run = %run.id, text = %record.text, "edit recorded");
        self.edits.insert(run.id, record);
        if creating {
            EditOutcome::Created
        } else {
            EditOutcome::Updated
        }
    }

    pub fn edit(&self, run_id: &RunId) -> Option<&EditRecord> {
        self.edits.get(run_id)
    }

    pub fn edits(&self) -> impl Iterator<Item = &EditRecord> {
        self.edits.values()
    }

    pub fn edits_on_page(&self, page: u32) -> impl Iterator<Item = &EditRecord> {
        self.edits.values().filter(move |record| record.run_id.page == page)
    }

    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    /// Drop a record so the run renders as the original again.
    pub fn remove_edit(&mut self, run_id: &RunId) -> Option<EditRecord> {
        self.edits.remove(run_id)
    }

    pub fn add_text(&mut self, run: AddedTextRun) {
        debug!(id = run.id, page = run.page_index, "added text");
        self.added_texts.push(run);
    }

    pub fn remove_text(&mut self, id: u64) -> Option<AddedTextRun> {
        let position = self.added_texts.iter().position(|run| run.id == id)?;
        Some(self.added_texts.remove(position))
    }

    pub fn added_texts(&self) -> &[AddedTextRun] {
        &self.added_texts
    }

    pub fn texts_on_page(&self, page: u32) -> impl Iterator<Item = &AddedTextRun> {
        self.added_texts.iter().filter(move |run| run.page_index == page)
    }

    pub fn add_overlay(&mut self, layer: OverlayText) {
        debug!(id = layer.id, page = layer.page_index, "added overlay layer");
        self.overlays.push(layer);
    }

    pub fn remove_overlay(&mut self, id: u64) -> Option<OverlayText> {
        let position = self.overlays.iter().position(|layer| layer.id == id)?;
        Some(self.overlays.remove(position))
    }

    pub fn overlays(&self) -> &[OverlayText] {
        &self.overlays
    }

    pub fn overlays_on_page(&self, page: u32) -> impl Iterator<Item = &OverlayText> {
        self.overlays.iter().filter(move |layer| layer.page_index == page)
    }

    pub fn append_path(&mut self, path: DrawingPath) {
        debug!(id = path.id, points = path.points.len(), "stroke appended");
        self.paths.push(path);
    }

    pub fn clear_paths(&mut self) {
        self.paths.clear();
    }

    /// Remove the most recent stroke.
    pub fn undo_path(&mut self) -> Option<DrawingPath> {
        self.paths.pop()
    }

    /// Swap the whole stroke collection, e.g. to restore an undo snapshot.
    pub fn replace_paths(&mut self, paths: Vec<DrawingPath>) {
        self.paths = paths;
    }

    pub fn paths(&self) -> &[DrawingPath] {
        &self.paths
    }

    pub fn paths_on_page(&self, page: u32) -> impl Iterator<Item = &DrawingPath> {
        self.paths.iter().filter(move |path| path.page_index == page)
    }
}

fn only_when<T>(condition: bool, value: Option<T>) -> Option<T> {
    value.filter(|_| condition)
}
