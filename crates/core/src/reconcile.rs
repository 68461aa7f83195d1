//! Reconciliation: original document + edit ledger -> new document.
//!
//! One pass, page by page. On each page the order is fixed:
//! 1. masked and redrawn native runs
//! 2. percentage-anchored overlay layers
//! 3. added vector text
//! 4. freehand strokes
//!
//! Only an unreadable source or a failed serialization aborts; anything
//! narrower is logged and skipped.

use crate::config::ExportConfig;
use crate::error::ReconcileError;
use crate::font_resolver::{FontDescriptor, FontFetcher, FontResolver};
use doc_model::{DrawMode, EditLedger, GeometryModel, PagePoint, PageSize};
use pdf_engine::{DocumentWriter, LineStyle, PageCanvas};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// What an export did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReport {
    pub replaced_runs: usize,
    pub added_texts: usize,
    pub overlay_layers: usize,
    pub line_segments: usize,
    /// Web fonts that could not be used
    pub font_fallbacks: usize,
    /// Edits whose run is not in the geometry model
    pub skipped_runs: usize,
    /// Eraser strokes, which only exist on screen
    pub skipped_paths: usize,
    pub skipped_pages: usize,
}

#[derive(Debug, Clone)]
pub struct ReconciledDocument {
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}

impl ReconciledDocument {
    pub fn write_to(&self, path: &Path) -> Result<(), ReconcileError> {
        fs::write(path, &self.bytes)
            .map_err(|source| ReconcileError::Write { path: path.to_path_buf(), source })
    }
}

/// One export invocation. Holds nothing between calls.
pub struct Reconciler<'a> {
    config: &'a ExportConfig,
    fetcher: Option<&'a dyn FontFetcher>,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a ExportConfig) -> Self {
        Self { config, fetcher: None }
    }

    /// Enables web fonts through `fetcher` (unless the config disables them).
    pub fn with_fetcher(mut self, fetcher: &'a dyn FontFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn reconcile(
        &self,
        source: &[u8],
        geometry: &GeometryModel,
        ledger: &EditLedger,
    ) -> Result<ReconciledDocument, ReconcileError> {
        let mut writer = DocumentWriter::load(source).map_err(ReconcileError::Load)?;
        let fetcher = self.fetcher.filter(|_| self.config.fetch_web_fonts);
        let mut fonts = FontResolver::new(fetcher);
        let mut report = ExportReport::default();

        for page_index in 0..writer.page_count() {
            let page = match writer.page_size(page_index) {
                Ok(size) => size,
                Err(err) => {
                    warn!(page = page_index, error = %err, "page skipped");
                    report.skipped_pages += 1;
                    continue;
                }
            };

            let mut canvas = PageCanvas::new(page_index);
            let mut page_report = ExportReport::default();
            self.paint_page(&mut canvas, &mut writer, &mut fonts, page, geometry, ledger, &mut page_report);

            if canvas.is_empty() {
                report.skipped_runs += page_report.skipped_runs;
                report.skipped_paths += page_report.skipped_paths;
                continue;
            }

            match writer.apply(canvas) {
                Ok(()) => {
                    debug!(page = page_index, "page reconciled");
                    report.merge(&page_report);
                }
                Err(err) => {
                    warn!(page = page_index, error = %err, "page skipped");
                    report.skipped_pages += 1;
                }
            }
        }

        report.font_fallbacks = fonts.fallbacks();
        let bytes = writer.save().map_err(ReconcileError::Save)?;
        info!(
            replaced = report.replaced_runs,
            added = report.added_texts,
            overlays = report.overlay_layers,
            segments = report.line_segments,
            "export finished"
        );

        Ok(ReconciledDocument { bytes, report })
    }

    #[allow(clippy::too_many_arguments)]
    fn paint_page(
        &self,
        canvas: &mut PageCanvas,
        writer: &mut DocumentWriter,
        fonts: &mut FontResolver<'_>,
        page: PageSize,
        geometry: &GeometryModel,
        ledger: &EditLedger,
        report: &mut ExportReport,
    ) {
        let page_index = canvas.page_index();

        for edit in ledger.edits_on_page(page_index) {
            let Some(run) = geometry.run(&edit.run_id) else {
                warn!(run = %edit.run_id, "edit refers to an unknown run, skipped");
                report.skipped_runs += 1;
                continue;
            };

            canvas.fill_rect(run.bbox().expand(self.config.mask_margin), edit.mask_color());

            let descriptor = FontDescriptor::new(&run.font_name)
                .with_family(edit.font_family.as_deref())
                .with_weight(edit.font_weight)
                .with_style(edit.font_style);
            let font = fonts.resolve(writer, &descriptor);
            let size = edit.effective_font_size(run.height);
            let lines = font.program.wrap_lines(&edit.text, size, None);
            canvas.draw_text_lines(
                &font,
                &lines,
                PagePoint::new(run.x, run.y),
                size,
                size * self.config.line_height_ratio,
                edit.effective_color(),
            );
            report.replaced_runs += 1;
        }

        for layer in ledger.overlays_on_page(page_index) {
            let descriptor = FontDescriptor::new("")
                .with_family(layer.font_family.as_deref())
                .with_weight(Some(layer.font_weight))
                .with_style(Some(layer.font_style));
            let font = fonts.resolve(writer, &descriptor);
            canvas.draw_text(&font, &layer.text, layer.anchor, layer.font_size, layer.color);
            report.overlay_layers += 1;
        }

        for text in ledger.texts_on_page(page_index) {
            let descriptor = FontDescriptor::new("")
                .with_family(text.font_family.as_deref())
                .with_weight(Some(text.font_weight))
                .with_style(Some(text.font_style));
            let font = fonts.resolve(writer, &descriptor);
            let lines = font.program.wrap_lines(&text.text, text.font_size, text.max_width);
            let line_height = text.font_size * text.line_height.unwrap_or(self.config.line_height_ratio);
            canvas.draw_text_lines(&font, &lines, text.baseline, text.font_size, line_height, text.color);
            report.added_texts += 1;
        }

        for path in ledger.paths_on_page(page_index) {
            if path.mode == DrawMode::Eraser {
                warn!(path = path.id, "eraser strokes are not exported, skipped");
                report.skipped_paths += 1;
                continue;
            }

            let style = LineStyle {
                color: path.color,
                width: path.width,
                opacity: path.opacity,
                dash: path.style.dash_pattern(path.width),
            };
            for (from, to) in path.segments() {
                canvas.stroke_line(from, to, &style);
                report.line_segments += 1;
            }
        }

        debug!(page = page_index, width = page.width_pt, height = page.height_pt, "page painted");
    }
}

impl ExportReport {
    fn merge(&mut self, other: &ExportReport) {
        self.replaced_runs += other.replaced_runs;
        self.added_texts += other.added_texts;
        self.overlay_layers += other.overlay_layers;
        self.line_segments += other.line_segments;
        self.skipped_runs += other.skipped_runs;
        self.skipped_paths += other.skipped_paths;
    }
}
