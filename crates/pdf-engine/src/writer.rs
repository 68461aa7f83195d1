//! Document mutation: append drawing operations to existing pages.
//!
//! The original page content is wrapped in `q ... Q` so that whatever
//! graphics state it leaves behind cannot leak into the appended operations,
//! which always run in default user space (bottom-left origin, points).

use crate::fonts::{encode_win_ansi, FontProgram, StandardFont, TrueTypeFont, TRUETYPE_FIRST_CHAR, TRUETYPE_LAST_CHAR};
use crate::objects::{page_ids, page_resources, page_size, resolve_dict};
use crate::{ensure_not_encrypted, PageSize, PdfEngineError};
use doc_model::{Color, PagePoint, Rect};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// A font object added to the output document.
#[derive(Debug, Clone)]
pub struct FontRef {
    pub id: ObjectId,
    pub program: FontProgram,
}

impl FontRef {
    fn resource_name(&self) -> Vec<u8> {
        format!("IpF{}", self.id.0).into_bytes()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub color: Color,
    pub width: f32,
    /// 0.0..=1.0
    pub opacity: f32,
    pub dash: Vec<f32>,
}

/// Operations queued for one page.
#[derive(Debug, Clone)]
pub struct PageCanvas {
    page_index: u32,
    operations: Vec<Operation>,
    fonts: BTreeMap<Vec<u8>, ObjectId>,
    opacities: Vec<(Vec<u8>, f32)>,
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

fn color_operands(color: Color) -> Vec<Object> {
    let (r, g, b) = color.to_normalized();
    vec![real(r), real(g), real(b)]
}

impl PageCanvas {
    pub fn new(page_index: u32) -> Self {
        Self { page_index, operations: Vec::new(), fonts: BTreeMap::new(), opacities: Vec::new() }
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Opaque rectangle, filled with `color`.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("rg", color_operands(color)),
            Operation::new("re", vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// One line of text with its baseline origin at `origin`.
    pub fn draw_text(&mut self, font: &FontRef, text: &str, origin: PagePoint, size: f32, color: Color) {
        let name = font.resource_name();
        self.fonts.insert(name.clone(), font.id);

        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(name), real(size)]),
            Operation::new("rg", color_operands(color)),
            Operation::new(
                "Tm",
                vec![real(1.0), real(0.0), real(0.0), real(1.0), real(origin.x), real(origin.y)],
            ),
            Operation::new("Tj", vec![Object::String(encode_win_ansi(text), StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Lines stacked downwards from `origin`, `line_height` apart.
    pub fn draw_text_lines(
        &mut self,
        font: &FontRef,
        lines: &[String],
        origin: PagePoint,
        size: f32,
        line_height: f32,
        color: Color,
    ) {
        for (i, line) in lines.iter().enumerate() {
            let baseline = PagePoint::new(origin.x, origin.y - line_height * i as f32);
            self.draw_text(font, line, baseline, size, color);
        }
    }

    pub fn stroke_line(&mut self, from: PagePoint, to: PagePoint, style: &LineStyle) {
        self.operations.push(Operation::new("q", vec![]));

        if style.opacity < 1.0 {
            let name = self.opacity_state(style.opacity);
            self.operations.push(Operation::new("gs", vec![Object::Name(name)]));
        }

        self.operations.extend([
            Operation::new("RG", color_operands(style.color)),
            Operation::new("w", vec![real(style.width)]),
            Operation::new("J", vec![Object::Integer(1)]),
            Operation::new("j", vec![Object::Integer(1)]),
        ]);

        if !style.dash.is_empty() {
            let dash = style.dash.iter().map(|v| real(*v)).collect::<Vec<_>>();
            self.operations.push(Operation::new("d", vec![Object::Array(dash), Object::Integer(0)]));
        }

        self.operations.extend([
            Operation::new("m", vec![real(from.x), real(from.y)]),
            Operation::new("l", vec![real(to.x), real(to.y)]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn opacity_state(&mut self, opacity: f32) -> Vec<u8> {
        let opacity = opacity.clamp(0.0, 1.0);
        if let Some((name, _)) = self.opacities.iter().find(|(_, value)| (*value - opacity).abs() < f32::EPSILON) {
            return name.clone();
        }
        let name = format!("IpGS{}", self.opacities.len()).into_bytes();
        self.opacities.push((name.clone(), opacity));
        name
    }
}

/// An output document under construction.
#[derive(Debug)]
pub struct DocumentWriter {
    doc: Document,
    pages: Vec<ObjectId>,
    standard_fonts: HashMap<StandardFont, ObjectId>,
    embedded_fonts: HashMap<String, ObjectId>,
}

impl DocumentWriter {
    pub fn load(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        ensure_not_encrypted(bytes)?;
        let doc = Document::load_mem(bytes)?;
        let pages = page_ids(&doc);
        if pages.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }
        Ok(Self { doc, pages, standard_fonts: HashMap::new(), embedded_fonts: HashMap::new() })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError> {
        let page_id = self.page_id(page_index)?;
        Ok(page_size(&self.doc, page_id))
    }

    fn page_id(&self, page_index: u32) -> Result<ObjectId, PdfEngineError> {
        self.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.page_count(),
        })
    }

    pub fn add_standard_font(&mut self, font: StandardFont) -> FontRef {
        let id = match self.standard_fonts.get(&font) {
            Some(id) => *id,
            None => {
                let id = self.doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => font.base_name(),
                    "Encoding" => "WinAnsiEncoding",
                });
                self.standard_fonts.insert(font, id);
                id
            }
        };
        FontRef { id, program: FontProgram::Standard(font) }
    }

    /// Embed a TrueType program as a simple WinAnsi font.
    pub fn add_truetype_font(&mut self, font: Arc<TrueTypeFont>) -> FontRef {
        if let Some(id) = self.embedded_fonts.get(&font.name) {
            return FontRef { id: *id, program: FontProgram::TrueType(font) };
        }

        let file_id = self.doc.add_object(Stream::new(
            dictionary! { "Length1" => font.data.len() as i64 },
            font.data.as_ref().clone(),
        ));

        // Nonsymbolic, plus italic when the face says so.
        let flags: i64 = if font.italic { 32 | 64 } else { 32 };
        let descriptor_id = self.doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(font.name.clone().into_bytes()),
            "Flags" => flags,
            "FontBBox" => font.bbox.iter().map(|v| Object::Integer(i64::from(*v))).collect::<Vec<_>>(),
            "ItalicAngle" => if font.italic { -12i64 } else { 0 },
            "Ascent" => i64::from(font.ascent),
            "Descent" => i64::from(font.descent),
            "CapHeight" => i64::from(font.cap_height),
            "StemV" => if font.bold { 120i64 } else { 80 },
            "FontFile2" => file_id,
        });

        let widths: Vec<Object> = font.widths.iter().map(|w| Object::Integer(i64::from(*w))).collect();
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => Object::Name(font.name.clone().into_bytes()),
            "FirstChar" => i64::from(TRUETYPE_FIRST_CHAR),
            "LastChar" => i64::from(TRUETYPE_LAST_CHAR),
            "Widths" => widths,
            "FontDescriptor" => descriptor_id,
            "Encoding" => "WinAnsiEncoding",
        });

        debug!(font = %font.name, bytes = font.data.len(), "embedded TrueType font");
        self.embedded_fonts.insert(font.name.clone(), id);
        FontRef { id, program: FontProgram::TrueType(font) }
    }

    /// Append the canvas operations to its page.
    pub fn apply(&mut self, canvas: PageCanvas) -> Result<(), PdfEngineError> {
        if canvas.is_empty() {
            return Ok(());
        }
        let page_id = self.page_id(canvas.page_index)?;

        let mut resources = page_resources(&self.doc, page_id).cloned().unwrap_or_default();
        let mut fonts = self.sub_dictionary(&resources, b"Font");
        for (name, id) in &canvas.fonts {
            fonts.set(name.clone(), *id);
        }
        resources.set("Font", fonts);

        if !canvas.opacities.is_empty() {
            let mut states = self.sub_dictionary(&resources, b"ExtGState");
            for (name, opacity) in &canvas.opacities {
                let state_id = self.doc.add_object(dictionary! {
                    "Type" => "ExtGState",
                    "CA" => Object::Real(*opacity),
                    "ca" => Object::Real(*opacity),
                });
                states.set(name.clone(), state_id);
            }
            resources.set("ExtGState", states);
        }

        let mut appended = b"Q\n".to_vec();
        appended.extend(Content { operations: canvas.operations }.encode()?);

        let open_id = self.doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let appended_id = self.doc.add_object(Stream::new(Dictionary::new(), appended));

        let page = self.doc.get_object_mut(page_id)?.as_dict_mut()?;
        let mut contents = vec![Object::Reference(open_id)];
        match page.get(b"Contents") {
            Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
            Ok(existing @ Object::Reference(_)) => contents.push(existing.clone()),
            _ => {}
        }
        contents.push(Object::Reference(appended_id));

        page.set("Contents", contents);
        page.set("Resources", resources);

        debug!(page = canvas.page_index, "page content appended");
        Ok(())
    }

    /// Inline copy of a resource category, following a reference if needed.
    fn sub_dictionary(&self, resources: &Dictionary, key: &[u8]) -> Dictionary {
        resources
            .get(key)
            .ok()
            .and_then(|obj| resolve_dict(&self.doc, obj))
            .cloned()
            .unwrap_or_default()
    }

    pub fn save(mut self) -> Result<Vec<u8>, PdfEngineError> {
        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }
}
