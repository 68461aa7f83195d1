//! Text extraction: a minimal content-stream interpreter.
//!
//! Reports one [`RawTextItem`] per text-showing operator (`Tj`, `TJ`, `'`,
//! `"`) with the text rendering matrix at the start of the string, its
//! advance width in page units and the font's base name. Form XObjects are
//! not entered.

use crate::fonts::{decode_win_ansi, win_ansi_char, StandardFont};
use crate::objects::{number, page_resources, resolve, resolve_dict};
use crate::PdfEngineError;
use doc_model::RawTextItem;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::debug;

/// Advance used when a font reports nothing better (thousandths of an em).
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// Affine matrix `[a b c d e f]`, applied to row vectors as PDF does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self { e: tx, f: ty, ..Self::IDENTITY }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let n = |i: usize| number(&operands[i]);
        Some(Self { a: n(0)?, b: n(1)?, c: n(2)?, d: n(3)?, e: n(4)?, f: n(5)? })
    }

    /// `self` followed by `next`.
    pub fn then(self, next: Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    pub fn to_array(self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

/// Character-code to Unicode mapping from a `/ToUnicode` CMap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicodeMap {
    entries: HashMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    Word(String),
    ArrayStart,
    ArrayEnd,
}

impl ToUnicodeMap {
    /// Parse `bfchar` and `bfrange` sections; everything else is ignored.
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize_cmap(data);
        let mut entries = HashMap::new();
        let mut iter = tokens.into_iter();

        while let Some(token) = iter.next() {
            match token {
                CMapToken::Word(word) if word == "beginbfchar" => loop {
                    let (Some(CMapToken::Hex(src)), Some(CMapToken::Hex(dst))) = (iter.next(), iter.next()) else {
                        break;
                    };
                    entries.insert(code_of(&src), utf16_string(&dst));
                },
                CMapToken::Word(word) if word == "beginbfrange" => loop {
                    let (Some(CMapToken::Hex(lo)), Some(CMapToken::Hex(hi))) = (iter.next(), iter.next()) else {
                        break;
                    };
                    let (lo, hi) = (code_of(&lo), code_of(&hi));
                    if hi < lo || hi - lo > 0xFFFF {
                        break;
                    }
                    match iter.next() {
                        Some(CMapToken::Hex(dst)) => {
                            let base = utf16_units(&dst);
                            for (offset, code) in (lo..=hi).enumerate() {
                                let mut units = base.clone();
                                if let Some(last) = units.last_mut() {
                                    *last = last.wrapping_add(offset as u16);
                                }
                                entries.insert(code, String::from_utf16_lossy(&units));
                            }
                        }
                        Some(CMapToken::ArrayStart) => {
                            let mut next = Some(lo);
                            while let Some(CMapToken::Hex(dst)) = iter.next() {
                                if let Some(code) = next.filter(|code| *code <= hi) {
                                    entries.insert(code, utf16_string(&dst));
                                    next = code.checked_add(1);
                                }
                            }
                        }
                        _ => break,
                    }
                },
                _ => {}
            }
        }

        Self { entries }
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.entries.get(&code).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() % 2 != 0 {
        return bytes.iter().map(|b| u16::from(*b)).collect();
    }
    bytes.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect()
}

fn utf16_string(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let end = data[start..].iter().position(|b| *b == b'>').map_or(data.len(), |p| start + p);
                let digits: Vec<u8> = data[start..end].iter().copied().filter(u8::is_ascii_hexdigit).collect();
                let bytes = digits
                    .chunks(2)
                    .filter_map(|pair| {
                        let text = std::str::from_utf8(pair).ok()?;
                        let padded = if text.len() == 1 { format!("{text}0") } else { text.to_owned() };
                        u8::from_str_radix(&padded, 16).ok()
                    })
                    .collect();
                tokens.push(CMapToken::Hex(bytes));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                i += 1;
            }
            b'(' => {
                let mut depth = 0usize;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            byte if byte.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len() && !data[i].is_ascii_whitespace() && !b"<>[]()%".contains(&data[i]) {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(CMapToken::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }

    tokens
}

/// What the interpreter needs to know about one font resource.
#[derive(Debug, Clone)]
struct FontInfo {
    base_name: String,
    first_char: i64,
    widths: Vec<f32>,
    standard: Option<StandardFont>,
    to_unicode: Option<ToUnicodeMap>,
    two_byte: bool,
    default_width: f32,
}

impl FontInfo {
    fn unknown() -> Self {
        Self {
            base_name: String::new(),
            first_char: 0,
            widths: Vec::new(),
            standard: None,
            to_unicode: None,
            two_byte: false,
            default_width: DEFAULT_GLYPH_WIDTH,
        }
    }

    fn load(doc: &Document, dict: &Dictionary) -> Self {
        let name_of = |key: &[u8]| {
            dict.get(key)
                .ok()
                .and_then(|obj| resolve(doc, obj))
                .and_then(|obj| obj.as_name().ok())
                .map(|name| String::from_utf8_lossy(name).into_owned())
        };

        let base_name = name_of(b"BaseFont").unwrap_or_default();
        let two_byte = name_of(b"Subtype").as_deref() == Some("Type0");

        let widths = dict
            .get(b"Widths")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
            .map(|array| {
                array.iter().map(|item| resolve(doc, item).and_then(number).unwrap_or(0.0)).collect()
            })
            .unwrap_or_default();

        let first_char =
            dict.get(b"FirstChar").ok().and_then(|obj| resolve(doc, obj)).and_then(|obj| obj.as_i64().ok()).unwrap_or(0);

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_stream().ok())
            .and_then(|stream| {
                if stream.dict.get(b"Filter").is_ok() {
                    stream.decompressed_content().ok()
                } else {
                    Some(stream.content.clone())
                }
            })
            .map(|data| ToUnicodeMap::parse(&data))
            .filter(|map| !map.is_empty());

        let default_width = if two_byte {
            dict.get(b"DescendantFonts")
                .ok()
                .and_then(|obj| resolve(doc, obj))
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| array.first())
                .and_then(|obj| resolve_dict(doc, obj))
                .and_then(|descendant| descendant.get(b"DW").ok())
                .and_then(number)
                .unwrap_or(1000.0)
        } else {
            DEFAULT_GLYPH_WIDTH
        };

        Self {
            standard: StandardFont::from_base_name(&base_name),
            base_name,
            first_char,
            widths,
            to_unicode,
            two_byte,
            default_width,
        }
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes.chunks(2).map(code_of).collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        match &self.to_unicode {
            Some(map) => self
                .codes(bytes)
                .into_iter()
                .filter_map(|code| match map.get(code) {
                    Some(text) => Some(text.to_owned()),
                    None if !self.two_byte => win_ansi_char(code as u8).map(String::from),
                    None => None,
                })
                .collect(),
            None if self.two_byte => {
                self.codes(bytes).into_iter().filter_map(char::from_u32).collect()
            }
            None => decode_win_ansi(bytes),
        }
    }

    /// Glyph advance in thousandths of an em.
    fn width(&self, code: u32) -> f32 {
        if !self.two_byte {
            let index = i64::from(code) - self.first_char;
            if let Some(width) = usize::try_from(index).ok().and_then(|i| self.widths.get(i)) {
                return *width;
            }
            if let Some(standard) = self.standard {
                return win_ansi_char(code as u8).map_or(self.default_width, |ch| f32::from(standard.glyph_width(ch)));
            }
        }
        self.default_width
    }
}

#[derive(Debug, Clone)]
struct TextParams {
    font: Option<Vec<u8>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

enum Piece<'a> {
    Bytes(&'a [u8]),
    Adjust(f32),
}

struct Interpreter<'a> {
    doc: &'a Document,
    font_dict: Option<&'a Dictionary>,
    fonts: HashMap<Vec<u8>, FontInfo>,
    ctm: Matrix,
    params: TextParams,
    stack: Vec<(Matrix, TextParams)>,
    tm: Matrix,
    lm: Matrix,
    items: Vec<RawTextItem>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, resources: Option<&'a Dictionary>) -> Self {
        let font_dict =
            resources.and_then(|res| res.get(b"Font").ok()).and_then(|obj| resolve_dict(doc, obj));
        Self {
            doc,
            font_dict,
            fonts: HashMap::new(),
            ctm: Matrix::IDENTITY,
            params: TextParams::default(),
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            lm: Matrix::IDENTITY,
            items: Vec::new(),
        }
    }

    fn font(&mut self) -> FontInfo {
        let Some(name) = self.params.font.clone() else {
            return FontInfo::unknown();
        };
        if let Some(info) = self.fonts.get(&name) {
            return info.clone();
        }
        let info = self
            .font_dict
            .and_then(|fonts| fonts.get(&name).ok())
            .and_then(|obj| resolve_dict(self.doc, obj))
            .map(|dict| FontInfo::load(self.doc, dict))
            .unwrap_or_else(|| {
                debug!(font = %String::from_utf8_lossy(&name), "font resource missing");
                FontInfo::unknown()
            });
        self.fonts.insert(name, info.clone());
        info
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.lm = Matrix::translate(tx, ty).then(self.lm);
        self.tm = self.lm;
    }

    fn show(&mut self, pieces: &[Piece<'_>]) {
        let font = self.font();
        let params = &self.params;
        let size = params.size;
        let scale = params.horizontal_scale;

        let start = self.tm;
        let rendering = Matrix { a: size * scale, b: 0.0, c: 0.0, d: size, e: 0.0, f: params.rise }
            .then(start)
            .then(self.ctm);

        let mut text = String::new();
        let mut advance = 0.0f32;
        for piece in pieces {
            match piece {
                Piece::Bytes(bytes) => {
                    text.push_str(&font.decode(bytes));
                    for code in font.codes(bytes) {
                        let spacing = if !font.two_byte && code == 32 { params.word_spacing } else { 0.0 };
                        advance += (font.width(code) / 1000.0 * size + params.char_spacing + spacing) * scale;
                    }
                }
                Piece::Adjust(amount) => advance -= amount / 1000.0 * size * scale,
            }
        }

        self.tm = Matrix::translate(advance, 0.0).then(self.tm);

        let user = start.then(self.ctm);
        let width = advance * user.a.hypot(user.b);
        let height = rendering.c.hypot(rendering.d);

        self.items.push(RawTextItem {
            text,
            transform: rendering.to_array().to_vec(),
            width: Some(width.abs()),
            height: Some(height),
            font_name: Some(font.base_name),
        });
    }

    fn run(&mut self, content: &Content) {
        for operation in &content.operations {
            let ops = &operation.operands;
            let num = |i: usize| ops.get(i).and_then(number);

            match operation.operator.as_str() {
                "q" => self.stack.push((self.ctm, self.params.clone())),
                "Q" => {
                    if let Some((ctm, params)) = self.stack.pop() {
                        self.ctm = ctm;
                        self.params = params;
                    }
                }
                "cm" => {
                    if let Some(matrix) = Matrix::from_operands(ops) {
                        self.ctm = matrix.then(self.ctm);
                    }
                }
                "BT" => {
                    self.tm = Matrix::IDENTITY;
                    self.lm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = ops.first() {
                        self.params.font = Some(name.clone());
                    }
                    if let Some(size) = num(1) {
                        self.params.size = size;
                    }
                }
                "Tc" => self.params.char_spacing = num(0).unwrap_or(0.0),
                "Tw" => self.params.word_spacing = num(0).unwrap_or(0.0),
                "Tz" => self.params.horizontal_scale = num(0).unwrap_or(100.0) / 100.0,
                "TL" => self.params.leading = num(0).unwrap_or(0.0),
                "Ts" => self.params.rise = num(0).unwrap_or(0.0),
                "Tm" => {
                    if let Some(matrix) = Matrix::from_operands(ops) {
                        self.tm = matrix;
                        self.lm = matrix;
                    }
                }
                "Td" => self.next_line(num(0).unwrap_or(0.0), num(1).unwrap_or(0.0)),
                "TD" => {
                    let ty = num(1).unwrap_or(0.0);
                    self.params.leading = -ty;
                    self.next_line(num(0).unwrap_or(0.0), ty);
                }
                "T*" => self.next_line(0.0, -self.params.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = ops.first() {
                        self.show(&[Piece::Bytes(bytes)]);
                    }
                }
                "'" => {
                    self.next_line(0.0, -self.params.leading);
                    if let Some(Object::String(bytes, _)) = ops.first() {
                        self.show(&[Piece::Bytes(bytes)]);
                    }
                }
                "\"" => {
                    self.params.word_spacing = num(0).unwrap_or(0.0);
                    self.params.char_spacing = num(1).unwrap_or(0.0);
                    self.next_line(0.0, -self.params.leading);
                    if let Some(Object::String(bytes, _)) = ops.get(2) {
                        self.show(&[Piece::Bytes(bytes)]);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(array)) = ops.first() {
                        let pieces: Vec<Piece<'_>> = array
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(Piece::Bytes(bytes)),
                                other => number(other).map(Piece::Adjust),
                            })
                            .collect();
                        self.show(&pieces);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Extract text items from one page of a parsed document.
pub fn extract_page_text(doc: &Document, page_id: ObjectId) -> Result<Vec<RawTextItem>, PdfEngineError> {
    let bytes = doc.get_page_content(page_id)?;
    let content = Content::decode(&bytes)?;

    let mut interpreter = Interpreter::new(doc, page_resources(doc, page_id));
    interpreter.run(&content);

    debug!(page = ?page_id, items = interpreter.items.len(), "extracted text items");
    Ok(interpreter.items)
}
