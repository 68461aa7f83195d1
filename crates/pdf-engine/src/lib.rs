pub mod extract;
pub mod fonts;
mod objects;
pub mod writer;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use doc_model::PageSize;
pub use extract::{extract_page_text, Matrix, ToUnicodeMap};
pub use fonts::{FontProgram, StandardFamily, StandardFont, TrueTypeFont};
pub use writer::{DocumentWriter, FontRef, LineStyle, PageCanvas};

use doc_model::RawTextItem;
use image::{ImageBuffer, Rgba};
use lopdf::{Document, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    /// Pixels per point
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("font error: {0}")]
    Font(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// The document collaborator: loading, geometry, text and rasters.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, PdfEngineError>;
    /// Text-extraction items for one page, in content-stream order.
    fn text_items(&self, handle: DocumentHandle, page_index: u32) -> Result<Vec<RawTextItem>, PdfEngineError>;
    fn render_page(&self, handle: DocumentHandle, request: RenderRequest) -> Result<RgbaImage, PdfEngineError>;
    /// Whether rasters show page content. Blank-paper rasters carry no colors.
    fn paints_content(&self) -> bool {
        true
    }
    /// The bytes the document was opened from.
    fn document_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

pub(crate) fn ensure_not_encrypted(bytes: &[u8]) -> Result<(), PdfEngineError> {
    if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
        return Err(PdfEngineError::EncryptedUnsupported);
    }
    Ok(())
}

#[derive(Debug)]
struct DocumentRecord {
    bytes: Vec<u8>,
    doc: Document,
    pages: Vec<ObjectId>,
    page_sizes: Vec<PageSize>,
}

/// Pure-Rust engine. Rasters are blank paper of the right size; content is
/// not painted.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(bytes: Vec<u8>) -> Result<DocumentRecord, PdfEngineError> {
        ensure_not_encrypted(&bytes)?;

        let doc = Document::load_mem(&bytes)?;
        let pages = objects::page_ids(&doc);
        if pages.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }
        let page_sizes = pages.iter().map(|id| objects::page_size(&doc, *id)).collect();

        Ok(DocumentRecord { bytes, doc, pages, page_sizes })
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn page_id(&self, handle: DocumentHandle, page_index: u32) -> Result<ObjectId, PdfEngineError> {
        let record = self.record(handle)?;
        record.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.pages.len() as u32,
        })
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let record = Self::parse(bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = record.pages.len(), "document opened");
        self.docs.insert(handle, record);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn text_items(&self, handle: DocumentHandle, page_index: u32) -> Result<Vec<RawTextItem>, PdfEngineError> {
        let page_id = self.page_id(handle, page_index)?;
        extract_page_text(&self.record(handle)?.doc, page_id)
    }

    fn render_page(&self, handle: DocumentHandle, request: RenderRequest) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        Ok(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
    }

    fn paints_content(&self) -> bool {
        false
    }

    fn document_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError> {
        Ok(&self.record(handle)?.bytes)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Real rasterization through a system pdfium library; everything else
    /// is delegated to [`LopdfEngine`].
    pub struct PdfiumEngine {
        pdfium: Pdfium,
        inner: LopdfEngine,
    }

    impl PdfiumEngine {
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|err| {
                PdfEngineError::Backend(format!("failed to bind pdfium system library: {err}"))
            })?;

            Ok(Self { pdfium: Pdfium::new(bindings), inner: LopdfEngine::default() })
        }
    }

    impl PdfEngine for PdfiumEngine {
        fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
            self.inner.open(source)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            self.inner.page_count(handle)
        }

        fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, PdfEngineError> {
            self.inner.page_size(handle, page_index)
        }

        fn text_items(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<Vec<RawTextItem>, PdfEngineError> {
            self.inner.text_items(handle, page_index)
        }

        fn render_page(&self, handle: DocumentHandle, request: RenderRequest) -> Result<RgbaImage, PdfEngineError> {
            let backend = |err: PdfiumError| PdfEngineError::Backend(err.to_string());
            let bytes = self.inner.document_bytes(handle)?;
            let document = self.pdfium.load_pdf_from_byte_slice(bytes, None).map_err(backend)?;
            let index = u16::try_from(request.page_index).map_err(|_| PdfEngineError::PageOutOfRange {
                page: request.page_index,
                page_count: document.pages().len() as u32,
            })?;
            let page = document.pages().get(index).map_err(backend)?;
            let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };
            let bitmap = page
                .render_with_config(&PdfRenderConfig::new().scale_page_by_factor(scale))
                .map_err(backend)?;

            Ok(bitmap.as_image().into_rgba8())
        }

        fn document_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError> {
            self.inner.document_bytes(handle)
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.inner.close(handle)
        }
    }
}
