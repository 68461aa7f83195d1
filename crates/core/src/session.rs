//! One editing session over one loaded document.
//!
//! The session owns the engine handle, the geometry extracted at load time,
//! the edit ledger and a per-page raster cache used for color sampling. UI
//! input arrives in whatever convention the caller uses and is normalized to
//! page points before it reaches the ledger.

use crate::config::ExportConfig;
use crate::error::SessionError;
use crate::font_resolver::FontFetcher;
use crate::reconcile::{ExportReport, Reconciler};
use crate::sampler::RasterView;
use doc_model::{
    AddedTextRun, Color, DrawingPath, EditLedger, EditOutcome, EditPatch, GeometryModel, OverlayText,
    PageGeometry, PagePoint, PageSize, PercentPoint, PercentText, RunId, SampledColors, StrokeSettings,
    TextRun, TopLeftText,
};
use pdf_engine::{DocumentHandle, LopdfEngine, OpenSource, PdfEngine, RenderRequest, RgbaImage};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Prefix of the exported file name.
pub const EXPORT_PREFIX: &str = "edited_";

/// Output of [`EditSession::export`].
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}

pub fn export_file_name(source_name: &str) -> String {
    format!("{EXPORT_PREFIX}{source_name}")
}

pub struct EditSession<E: PdfEngine = LopdfEngine> {
    engine: E,
    handle: DocumentHandle,
    source_name: String,
    config: ExportConfig,
    geometry: GeometryModel,
    ledger: EditLedger,
    /// `None` marks a page whose rasterization failed
    rasters: HashMap<u32, Option<RgbaImage>>,
}

impl EditSession<LopdfEngine> {
    pub fn open_path(path: &Path, config: ExportConfig) -> Result<Self, SessionError> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("document.pdf").to_owned();
        Self::open(LopdfEngine::new(), OpenSource::from(path), name, config)
    }

    pub fn open_bytes(bytes: Vec<u8>, name: impl Into<String>, config: ExportConfig) -> Result<Self, SessionError> {
        Self::open(LopdfEngine::new(), OpenSource::Bytes(bytes), name.into(), config)
    }
}

impl<E: PdfEngine> EditSession<E> {
    /// Load a document and extract its geometry. Only the load itself can fail.
    pub fn open(
        mut engine: E,
        source: OpenSource,
        source_name: String,
        config: ExportConfig,
    ) -> Result<Self, SessionError> {
        let handle = engine.open(source).map_err(SessionError::Open)?;
        let page_count = engine.page_count(handle).map_err(SessionError::Open)?;

        let mut pages = Vec::with_capacity(page_count as usize);
        for index in 0..page_count {
            let size = engine.page_size(handle, index).map_err(SessionError::Open)?;
            let items = engine.text_items(handle, index).unwrap_or_else(|err| {
                warn!(page = index, error = %err, "text extraction failed, page has no runs");
                Vec::new()
            });
            pages.push(PageGeometry::from_items(index, size, &items));
        }
        let geometry = GeometryModel::new(pages);
        debug!(name = %source_name, pages = page_count, "session opened");

        Ok(Self {
            engine,
            handle,
            source_name,
            config,
            geometry,
            ledger: EditLedger::new(),
            rasters: HashMap::new(),
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn geometry(&self) -> &GeometryModel {
        &self.geometry
    }

    pub fn ledger(&self) -> &EditLedger {
        &self.ledger
    }

    /// Replace the ledger, e.g. with one restored from storage.
    pub fn restore_ledger(&mut self, ledger: EditLedger) {
        self.ledger = ledger;
    }

    pub fn page_size(&self, page_index: u32) -> Result<PageSize, SessionError> {
        self.geometry.page_size(page_index).ok_or(SessionError::PageOutOfRange {
            page: page_index,
            page_count: self.geometry.page_count(),
        })
    }

    pub fn run(&self, id: &RunId) -> Result<&TextRun, SessionError> {
        self.geometry.run(id).ok_or(SessionError::UnknownRun(*id))
    }

    pub fn hit_test(&self, page_index: u32, point: PagePoint) -> Option<&TextRun> {
        self.geometry.hit_test(page_index, point)
    }

    /// Page raster at the sampling scale, rendered on first use.
    pub fn raster(&mut self, page_index: u32) -> Option<&RgbaImage> {
        let engine = &self.engine;
        let handle = self.handle;
        let scale = self.config.sample_scale;

        self.rasters
            .entry(page_index)
            .or_insert_with(|| {
                match engine.render_page(handle, RenderRequest { page_index, scale }) {
                    Ok(image) => Some(image),
                    Err(err) => {
                        warn!(page = page_index, error = %err, "rasterization failed, sampling defaults");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Colors under and inside a run. Falls back to white/black without a
    /// raster or when the engine only renders blank paper.
    pub fn sample_run(&mut self, id: &RunId) -> Result<SampledColors, SessionError> {
        const DEFAULTS: SampledColors = SampledColors { background: Color::WHITE, foreground: Color::BLACK };

        let run = self.run(id)?;
        let bbox = run.bbox();
        let page = self.page_size(id.page)?;
        let scale = self.config.sample_scale;

        if !self.engine.paints_content() {
            debug!(run = %id, "engine renders blank paper, sampling defaults");
            return Ok(DEFAULTS);
        }

        let sampled = match self.raster(id.page) {
            Some(image) => RasterView::new(image, scale, page).sample(&bbox),
            None => DEFAULTS,
        };
        Ok(sampled)
    }

    /// Start editing a run: sample its colors and remember them as defaults.
    pub fn begin_edit(&mut self, id: &RunId) -> Result<SampledColors, SessionError> {
        let sampled = self.sample_run(id)?;
        self.ledger.record_sample(*id, sampled);
        debug!(run = %id, background = %sampled.background, foreground = %sampled.foreground, "edit started");
        Ok(sampled)
    }

    pub fn commit_edit(&mut self, id: &RunId, patch: EditPatch) -> Result<EditOutcome, SessionError> {
        let run = self.geometry.run(id).ok_or(SessionError::UnknownRun(*id))?;
        Ok(self.ledger.set_edit(run, patch))
    }

    pub fn revert_edit(&mut self, id: &RunId) -> bool {
        self.ledger.remove_edit(id).is_some()
    }

    /// Add vector text placed with a top-left origin.
    pub fn add_text_top_left(&mut self, input: TopLeftText) -> Result<u64, SessionError> {
        let page = self.page_size(input.page_index)?;
        let id = self.ledger.allocate_id();
        self.ledger.add_text(AddedTextRun::from_top_left(id, input, page, self.config.baseline_ratio));
        Ok(id)
    }

    pub fn remove_text(&mut self, id: u64) -> bool {
        self.ledger.remove_text(id).is_some()
    }

    pub fn add_overlay_pct(&mut self, input: PercentText) -> Result<u64, SessionError> {
        let page = self.page_size(input.page_index)?;
        let id = self.ledger.allocate_id();
        self.ledger.add_overlay(OverlayText::from_percent(id, input, page, self.config.overlay_font_size));
        Ok(id)
    }

    /// Append a finished stroke given in percent-of-page points.
    pub fn append_stroke_pct(
        &mut self,
        page_index: u32,
        points: &[PercentPoint],
        settings: StrokeSettings,
    ) -> Result<u64, SessionError> {
        let page = self.page_size(page_index)?;
        let id = self.ledger.allocate_id();
        self.ledger.append_path(DrawingPath::from_percent(id, page_index, points, page, settings));
        Ok(id)
    }

    pub fn undo_stroke(&mut self) -> Option<DrawingPath> {
        self.ledger.undo_path()
    }

    pub fn clear_strokes(&mut self) {
        self.ledger.clear_paths();
    }

    /// Reconcile the current ledger against the original bytes.
    ///
    /// The session is untouched; a failed export leaves nothing behind.
    pub fn export(&self, fetcher: Option<&dyn FontFetcher>) -> Result<ExportedDocument, SessionError> {
        let source = self.engine.document_bytes(self.handle)?;
        let mut reconciler = Reconciler::new(&self.config);
        if let Some(fetcher) = fetcher {
            reconciler = reconciler.with_fetcher(fetcher);
        }
        let output = reconciler.reconcile(source, &self.geometry, &self.ledger)?;

        Ok(ExportedDocument {
            file_name: export_file_name(&self.source_name),
            bytes: output.bytes,
            report: output.report,
        })
    }
}

impl<E: PdfEngine> Drop for EditSession<E> {
    fn drop(&mut self) {
        if let Err(err) = self.engine.close(self.handle) {
            debug!(error = %err, "document already closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{FontStyle, FontWeight, StrokeStyle};
    use lopdf::content::Content;
    use lopdf::{Document, Object};
    use pdf_engine::fixtures;

    fn hello_session() -> EditSession {
        EditSession::open_bytes(
            fixtures::single_run_pdf("Hello", 100.0, 700.0, 12.0),
            "letter.pdf",
            ExportConfig::default().with_web_fonts(false),
        )
        .unwrap()
    }

    fn number(object: &Object) -> Option<f32> {
        match object {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    #[test]
    fn geometry_is_extracted_on_open() {
        let session = hello_session();

        let run = session.run(&"n_p0_0".parse().unwrap()).unwrap();
        assert_eq!((run.x, run.y, run.height), (100.0, 700.0, 12.0));
        assert_eq!(run.text, "Hello");
        assert_eq!(run.font_name, "Helvetica");
    }

    #[test]
    fn corrupt_document_fails_to_open() {
        let result = EditSession::open_bytes(b"nope".to_vec(), "bad.pdf", ExportConfig::default());
        assert!(matches!(result, Err(SessionError::Open(_))));
    }

    #[test]
    fn begin_edit_records_sampled_colors() {
        let mut session = hello_session();
        let id = RunId::new(0, 0);

        let sampled = session.begin_edit(&id).unwrap();

        assert_eq!(sampled, SampledColors { background: Color::WHITE, foreground: Color::BLACK });
        assert_eq!(session.ledger().sampled(&id), Some(sampled));
        assert!(session.raster(0).is_some());
    }

    #[test]
    fn unchanged_commit_creates_nothing() {
        let mut session = hello_session();
        let id = RunId::new(0, 0);
        session.begin_edit(&id).unwrap();

        let outcome = session.commit_edit(&id, EditPatch::text("Hello")).unwrap();

        assert_eq!(outcome, EditOutcome::Unchanged);
        assert!(session.ledger().is_empty());
    }

    #[test]
    fn unknown_run_is_an_error() {
        let mut session = hello_session();
        let id = RunId::new(0, 5);

        assert!(matches!(session.begin_edit(&id), Err(SessionError::UnknownRun(_))));
        assert!(matches!(session.commit_edit(&id, EditPatch::text("x")), Err(SessionError::UnknownRun(_))));
    }

    #[test]
    fn hit_test_finds_run_near_click() {
        let session = hello_session();

        assert_eq!(session.hit_test(0, PagePoint::new(105.0, 705.0)).map(|r| r.id), Some(RunId::new(0, 0)));
        assert!(session.hit_test(0, PagePoint::new(400.0, 100.0)).is_none());
    }

    #[test]
    fn goodbye_end_to_end() {
        let mut session = hello_session();
        let id: RunId = "n_p0_0".parse().unwrap();
        session.begin_edit(&id).unwrap();
        let outcome = session
            .commit_edit(&id, EditPatch::text("Goodbye").with_color(Color::from_hex("#ff0000").unwrap()))
            .unwrap();
        assert_eq!(outcome, EditOutcome::Created);

        let exported = session.export(None).unwrap();
        assert_eq!(exported.file_name, "edited_letter.pdf");
        assert_eq!(exported.report.replaced_runs, 1);

        let doc = Document::load_mem(&exported.bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let ops = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap().operations;

        let re = ops.iter().position(|op| op.operator == "re").unwrap();
        let rect: Vec<f32> = ops[re].operands.iter().filter_map(number).collect();
        let run = session.run(&id).unwrap();
        assert_eq!(&rect[..2], &[98.0, 698.0]);
        assert!(rect[2] >= run.width + 4.0 - 1e-3);
        assert!(rect[3] >= 16.0 - 1e-3);
        let fill: Vec<f32> = ops[re - 1].operands.iter().filter_map(number).collect();
        assert_eq!(fill, vec![1.0, 1.0, 1.0]);

        let text_color = ops.iter().rfind(|op| op.operator == "rg").unwrap();
        assert_eq!(text_color.operands.iter().filter_map(number).collect::<Vec<_>>(), vec![1.0, 0.0, 0.0]);
        let tm = ops.iter().rfind(|op| op.operator == "Tm").unwrap();
        assert_eq!(tm.operands.iter().filter_map(number).skip(4).collect::<Vec<_>>(), vec![100.0, 700.0]);
        let tj = ops.iter().rfind(|op| op.operator == "Tj").unwrap();
        assert!(matches!(&tj.operands[0], Object::String(bytes, _) if bytes == b"Goodbye"));
    }

    #[test]
    fn added_content_is_normalized_on_ingestion() {
        let mut session = hello_session();

        let text_id = session
            .add_text_top_left(TopLeftText {
                page_index: 0,
                text: "Note".to_owned(),
                x: 72.0,
                y: 72.0,
                width: 0.0,
                font_size: 16.0,
                font_family: None,
                font_weight: FontWeight::NORMAL,
                font_style: FontStyle::Normal,
                color: Color::BLACK,
                line_height: None,
            })
            .unwrap();
        let overlay_id = session
            .add_overlay_pct(PercentText {
                page_index: 0,
                text: "Draft".to_owned(),
                x_pct: 10.0,
                y_pct: 10.0,
                font_size: None,
                font_family: None,
                font_weight: FontWeight::NORMAL,
                font_style: FontStyle::Normal,
                color: Color::rgb(200, 0, 0),
            })
            .unwrap();

        assert_ne!(text_id, overlay_id);
        let added = &session.ledger().added_texts()[0];
        assert_eq!(added.baseline, PagePoint::new(72.0, 792.0 - 72.0 - 12.0));
        let overlay = &session.ledger().overlays()[0];
        assert!((overlay.anchor.x - 61.2).abs() < 1e-3);
        assert!((overlay.anchor.y - 712.8).abs() < 1e-3);
        assert_eq!(overlay.font_size, 12.0);
    }

    #[test]
    fn strokes_append_and_undo() {
        let mut session = hello_session();
        let points = [PercentPoint::new(0.0, 0.0), PercentPoint::new(100.0, 100.0)];

        session.append_stroke_pct(0, &points, StrokeSettings::default()).unwrap();
        let second = session
            .append_stroke_pct(0, &points, StrokeSettings { style: StrokeStyle::Dotted, ..StrokeSettings::default() })
            .unwrap();

        assert_eq!(session.undo_stroke().map(|p| p.id), Some(second));
        assert_eq!(session.ledger().paths().len(), 1);
        assert_eq!(session.ledger().paths()[0].points[1], PagePoint::new(612.0, 0.0));

        assert!(matches!(
            session.append_stroke_pct(3, &points, StrokeSettings::default()),
            Err(SessionError::PageOutOfRange { page: 3, page_count: 1 })
        ));
    }

    /// Lopdf underneath, but rasters are uniform grey paper.
    struct GreyPaperEngine(LopdfEngine);

    impl PdfEngine for GreyPaperEngine {
        fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, pdf_engine::PdfEngineError> {
            self.0.open(source)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, pdf_engine::PdfEngineError> {
            self.0.page_count(handle)
        }

        fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, pdf_engine::PdfEngineError> {
            self.0.page_size(handle, page_index)
        }

        fn text_items(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<Vec<doc_model::RawTextItem>, pdf_engine::PdfEngineError> {
            self.0.text_items(handle, page_index)
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            request: RenderRequest,
        ) -> Result<RgbaImage, pdf_engine::PdfEngineError> {
            let mut image = self.0.render_page(handle, request)?;
            image.pixels_mut().for_each(|pixel| pixel.0 = [200, 200, 200, 255]);
            Ok(image)
        }

        fn document_bytes(&self, handle: DocumentHandle) -> Result<&[u8], pdf_engine::PdfEngineError> {
            self.0.document_bytes(handle)
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), pdf_engine::PdfEngineError> {
            self.0.close(handle)
        }
    }

    #[test]
    fn painted_rasters_are_sampled() {
        let mut session = EditSession::open(
            GreyPaperEngine(LopdfEngine::new()),
            OpenSource::Bytes(fixtures::single_run_pdf("Hello", 100.0, 700.0, 12.0)),
            "grey.pdf".to_owned(),
            ExportConfig::default().with_web_fonts(false),
        )
        .unwrap();

        let sampled = session.begin_edit(&RunId::new(0, 0)).unwrap();

        let grey = Color::rgb(200, 200, 200);
        assert_eq!(sampled, SampledColors { background: grey, foreground: grey });
    }

    #[test]
    fn export_does_not_change_the_session() {
        let mut session = hello_session();
        session.commit_edit(&RunId::new(0, 0), EditPatch::text("Once")).unwrap();

        let first = session.export(None).unwrap();
        let second = session.export(None).unwrap();

        assert_eq!(first.report, second.report);
        assert_eq!(session.ledger().edit_count(), 1);
        assert!(session.revert_edit(&RunId::new(0, 0)));
        assert!(session.ledger().is_empty());
    }
}
