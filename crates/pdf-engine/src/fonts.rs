//! Font programs usable by the content writer.
//!
//! Two kinds are supported: the twelve standard Type1 fonts every PDF reader
//! ships with, and TrueType programs embedded into the output document. Both
//! are addressed with single-byte WinAnsi codes.

use crate::PdfEngineError;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFamily {
    Helvetica,
    Times,
    Courier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    pub const ALL: [StandardFont; 12] = [
        StandardFont::Helvetica,
        StandardFont::HelveticaBold,
        StandardFont::HelveticaOblique,
        StandardFont::HelveticaBoldOblique,
        StandardFont::TimesRoman,
        StandardFont::TimesBold,
        StandardFont::TimesItalic,
        StandardFont::TimesBoldItalic,
        StandardFont::Courier,
        StandardFont::CourierBold,
        StandardFont::CourierOblique,
        StandardFont::CourierBoldOblique,
    ];

    pub fn from_parts(family: StandardFamily, bold: bool, italic: bool) -> Self {
        use StandardFont::*;
        match (family, bold, italic) {
            (StandardFamily::Helvetica, false, false) => Helvetica,
            (StandardFamily::Helvetica, true, false) => HelveticaBold,
            (StandardFamily::Helvetica, false, true) => HelveticaOblique,
            (StandardFamily::Helvetica, true, true) => HelveticaBoldOblique,
            (StandardFamily::Times, false, false) => TimesRoman,
            (StandardFamily::Times, true, false) => TimesBold,
            (StandardFamily::Times, false, true) => TimesItalic,
            (StandardFamily::Times, true, true) => TimesBoldItalic,
            (StandardFamily::Courier, false, false) => Courier,
            (StandardFamily::Courier, true, false) => CourierBold,
            (StandardFamily::Courier, false, true) => CourierOblique,
            (StandardFamily::Courier, true, true) => CourierBoldOblique,
        }
    }

    /// Match a `/BaseFont` name, ignoring any subset prefix (`ABCDEF+`).
    pub fn from_base_name(name: &str) -> Option<Self> {
        let name = name.split_once('+').map_or(name, |(_, rest)| rest);
        Self::ALL.into_iter().find(|font| font.base_name() == name)
    }

    pub fn base_name(&self) -> &'static str {
        use StandardFont::*;
        match self {
            Helvetica => "Helvetica",
            HelveticaBold => "Helvetica-Bold",
            HelveticaOblique => "Helvetica-Oblique",
            HelveticaBoldOblique => "Helvetica-BoldOblique",
            TimesRoman => "Times-Roman",
            TimesBold => "Times-Bold",
            TimesItalic => "Times-Italic",
            TimesBoldItalic => "Times-BoldItalic",
            Courier => "Courier",
            CourierBold => "Courier-Bold",
            CourierOblique => "Courier-Oblique",
            CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    pub fn family(&self) -> StandardFamily {
        use StandardFont::*;
        match self {
            Helvetica | HelveticaBold | HelveticaOblique | HelveticaBoldOblique => StandardFamily::Helvetica,
            TimesRoman | TimesBold | TimesItalic | TimesBoldItalic => StandardFamily::Times,
            Courier | CourierBold | CourierOblique | CourierBoldOblique => StandardFamily::Courier,
        }
    }

    pub fn is_bold(&self) -> bool {
        use StandardFont::*;
        matches!(
            self,
            HelveticaBold | HelveticaBoldOblique | TimesBold | TimesBoldItalic | CourierBold | CourierBoldOblique
        )
    }

    pub fn is_italic(&self) -> bool {
        use StandardFont::*;
        matches!(
            self,
            HelveticaOblique
                | HelveticaBoldOblique
                | TimesItalic
                | TimesBoldItalic
                | CourierOblique
                | CourierBoldOblique
        )
    }

    /// Advance of `ch` in thousandths of an em.
    ///
    /// Slanted variants share the upright metrics.
    pub fn glyph_width(&self, ch: char) -> u16 {
        let table = match (self.family(), self.is_bold()) {
            (StandardFamily::Courier, _) => return 600,
            (StandardFamily::Helvetica, false) => &HELVETICA_WIDTHS,
            (StandardFamily::Helvetica, true) => &HELVETICA_BOLD_WIDTHS,
            (StandardFamily::Times, false) => &TIMES_ROMAN_WIDTHS,
            (StandardFamily::Times, true) => &TIMES_BOLD_WIDTHS,
        };

        let code = ch as u32;
        if (32..=126).contains(&code) {
            table[(code - 32) as usize]
        } else {
            match self.family() {
                StandardFamily::Helvetica => 556,
                StandardFamily::Times => 500,
                StandardFamily::Courier => 600,
            }
        }
    }
}

// AFM advances for ASCII 32..=126 (WinAnsi: 39 is quotesingle, 96 is grave).
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, //
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, //
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, //
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, //
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, //
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, //
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, //
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, //
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

const TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278, //
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500, //
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778, //
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500, //
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500, //
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

/// WinAnsi code points 0x80..=0x9F that differ from Latin-1.
const WIN_ANSI_HIGH: [(u8, char); 27] = [
    (0x80, '€'),
    (0x82, '‚'),
    (0x83, 'ƒ'),
    (0x84, '„'),
    (0x85, '…'),
    (0x86, '†'),
    (0x87, '‡'),
    (0x88, 'ˆ'),
    (0x89, '‰'),
    (0x8A, 'Š'),
    (0x8B, '‹'),
    (0x8C, 'Œ'),
    (0x8E, 'Ž'),
    (0x91, '‘'),
    (0x92, '’'),
    (0x93, '“'),
    (0x94, '”'),
    (0x95, '•'),
    (0x96, '–'),
    (0x97, '—'),
    (0x98, '˜'),
    (0x99, '™'),
    (0x9A, 'š'),
    (0x9B, '›'),
    (0x9C, 'œ'),
    (0x9E, 'ž'),
    (0x9F, 'Ÿ'),
];

pub fn win_ansi_byte(ch: char) -> Option<u8> {
    if let Some((code, _)) = WIN_ANSI_HIGH.iter().find(|(_, c)| *c == ch) {
        return Some(*code);
    }
    match ch as u32 {
        code @ (0x20..=0x7E | 0xA0..=0xFF) => Some(code as u8),
        _ => None,
    }
}

pub fn win_ansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        b'\t' | b'\n' | b'\r' => Some(code as char),
        0x80..=0x9F => WIN_ANSI_HIGH.iter().find(|(c, _)| *c == code).map(|(_, ch)| *ch),
        _ => None,
    }
}

/// Encode text for a WinAnsi font; unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().filter(|ch| *ch != '\n' && *ch != '\r').map(|ch| win_ansi_byte(ch).unwrap_or(b'?')).collect()
}

pub fn decode_win_ansi(bytes: &[u8]) -> String {
    bytes.iter().filter_map(|b| win_ansi_char(*b)).collect()
}

/// A parsed TrueType program ready to embed.
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    pub name: String,
    pub data: Arc<Vec<u8>>,
    /// Advances for WinAnsi codes 32..=255, thousandths of an em
    pub widths: Vec<u16>,
    pub ascent: i16,
    pub descent: i16,
    pub cap_height: i16,
    pub bbox: [i16; 4],
    pub italic: bool,
    pub bold: bool,
}

pub const TRUETYPE_FIRST_CHAR: u8 = 32;
pub const TRUETYPE_LAST_CHAR: u8 = 255;

impl TrueTypeFont {
    pub fn parse(name: &str, data: Vec<u8>) -> Result<Self, PdfEngineError> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|err| PdfEngineError::Font(format!("{name}: {err}")))?;

        let units = f32::from(face.units_per_em().max(1));
        let scale = |value: i16| (f32::from(value) * 1000.0 / units).round() as i16;

        let widths = (TRUETYPE_FIRST_CHAR..=TRUETYPE_LAST_CHAR)
            .map(|code| {
                win_ansi_char(code)
                    .and_then(|ch| face.glyph_index(ch))
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .map(|advance| (f32::from(advance) * 1000.0 / units).round() as u16)
                    .unwrap_or(0)
            })
            .collect();

        let rect = face.global_bounding_box();
        let ascent = scale(face.ascender());

        Ok(Self {
            name: sanitize_font_name(name),
            widths,
            ascent,
            descent: scale(face.descender()),
            cap_height: face.capital_height().map(scale).unwrap_or(ascent),
            bbox: [scale(rect.x_min), scale(rect.y_min), scale(rect.x_max), scale(rect.y_max)],
            italic: face.is_italic(),
            bold: face.is_bold(),
            data: Arc::new(data),
        })
    }

    pub fn glyph_width(&self, ch: char) -> u16 {
        win_ansi_byte(ch)
            .and_then(|code| code.checked_sub(TRUETYPE_FIRST_CHAR))
            .and_then(|index| self.widths.get(index as usize).copied())
            .unwrap_or(500)
    }
}

/// PDF names may not contain whitespace or delimiters.
fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_owned()
    } else {
        cleaned
    }
}

/// Something the writer can set text in.
#[derive(Debug, Clone)]
pub enum FontProgram {
    Standard(StandardFont),
    TrueType(Arc<TrueTypeFont>),
}

impl FontProgram {
    pub fn base_name(&self) -> &str {
        match self {
            FontProgram::Standard(font) => font.base_name(),
            FontProgram::TrueType(font) => &font.name,
        }
    }

    pub fn glyph_width(&self, ch: char) -> u16 {
        match self {
            FontProgram::Standard(font) => font.glyph_width(ch),
            FontProgram::TrueType(font) => font.glyph_width(ch),
        }
    }

    /// Width of `text` at `size`, in points.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|ch| u32::from(self.glyph_width(ch))).sum();
        units as f32 * size / 1000.0
    }

    /// Split on newlines, then greedily wrap each paragraph to `max_width`.
    ///
    /// A single word wider than `max_width` gets a line of its own.
    pub fn wrap_lines(&self, text: &str, size: f32, max_width: Option<f32>) -> Vec<String> {
        let mut lines = Vec::new();

        for paragraph in text.split('\n').map(|line| line.trim_end_matches('\r')) {
            let Some(max_width) = max_width.filter(|w| *w > 0.0) else {
                lines.push(paragraph.to_owned());
                continue;
            };

            let mut current = String::new();
            for word in paragraph.split(' ') {
                let candidate =
                    if current.is_empty() { word.to_owned() } else { format!("{current} {word}") };
                if !current.is_empty() && self.text_width(&candidate, size) > max_width {
                    lines.push(std::mem::take(&mut current));
                    current = word.to_owned();
                } else {
                    current = candidate;
                }
            }
            lines.push(current);
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twelve_distinct_standard_fonts() {
        let mut names: Vec<_> = StandardFont::ALL.iter().map(|f| f.base_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 12);
    }

    #[test]
    fn from_parts_matches_flags() {
        for font in StandardFont::ALL {
            assert_eq!(StandardFont::from_parts(font.family(), font.is_bold(), font.is_italic()), font);
        }
    }

    #[test]
    fn base_name_lookup_ignores_subset_prefix() {
        assert_eq!(StandardFont::from_base_name("ABCDEF+Times-Bold"), Some(StandardFont::TimesBold));
        assert_eq!(StandardFont::from_base_name("ArialMT"), None);
    }

    #[test]
    fn helvetica_metrics() {
        let font = FontProgram::Standard(StandardFont::Helvetica);

        assert_eq!(font.glyph_width('H'), 722);
        assert_eq!(font.glyph_width('i'), 222);
        assert!((font.text_width("Hello", 10.0) - 22.78).abs() < 1e-3);
        assert_eq!(StandardFont::CourierBold.glyph_width('W'), 600);
    }

    #[test]
    fn win_ansi_maps_typographic_quotes() {
        assert_eq!(encode_win_ansi("“Hi” – €"), vec![0x93, b'H', b'i', 0x94, b' ', 0x96, b' ', 0x80]);
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
        assert_eq!(decode_win_ansi(&[b'c', 0xE9, 0x92]), "cé’");
    }

    #[test]
    fn wrap_respects_newlines_and_width() {
        let font = FontProgram::Standard(StandardFont::Courier);

        // Courier at 10pt: 6pt per character.
        let lines = font.wrap_lines("aaa bbb ccc\nddd", 10.0, Some(45.0));

        assert_eq!(lines, vec!["aaa bbb", "ccc", "ddd"]);
        assert_eq!(font.wrap_lines("one two", 10.0, None), vec!["one two"]);
    }

    #[test]
    fn garbage_truetype_is_an_error() {
        let err = TrueTypeFont::parse("Inter", vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, PdfEngineError::Font(_)));
    }
}
