//! Font descriptor resolution.
//!
//! A descriptor is whatever is known about a font: the name embedded in the
//! source document and any family, weight or style the user picked. It
//! resolves to one of the twelve standard fonts, or to a fetched web font
//! when the family is on a small allowlist.
//!
//! A [`FontResolver`] lives for exactly one export. It owns the fetch cache,
//! so a family that failed to download is not retried within that export.

use crate::error::FetchError;
use doc_model::{FontStyle, FontWeight};
use pdf_engine::{DocumentWriter, FontRef, StandardFamily, StandardFont, TrueTypeFont};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const BOLD_NEEDLES: &[&str] = &["bold", "heavy", "black", "700", "800"];
const ITALIC_NEEDLES: &[&str] = &["italic", "oblique"];
const SERIF_NEEDLES: &[&str] = &["serif", "times", "georgia", "roman", "playfair"];
const MONO_NEEDLES: &[&str] = &["mono", "courier", "console", "fixed", "fira"];

/// Largest font program accepted from the network.
const MAX_FONT_BYTES: u64 = 16 * 1024 * 1024;

/// A family that is worth downloading instead of approximating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebFont {
    pub name: &'static str,
    needles: &'static [&'static str],
    pub url: &'static str,
}

pub const WEB_FONTS: &[WebFont] = &[
    WebFont {
        name: "Inter",
        needles: &["inter"],
        url: "https://fonts.gstatic.com/s/inter/v13/UcCO3FwrK3iLTeHuS_fvQtMwCp50KnMw2boKoduKmMEVuGkyMZhrib2Bg-4.ttf",
    },
    WebFont {
        name: "Roboto",
        needles: &["roboto"],
        url: "https://fonts.gstatic.com/s/roboto/v30/KFOmCnqEu92Fr1Mu4mxKKTU1Kg.ttf",
    },
    WebFont {
        name: "Montserrat",
        needles: &["montserrat"],
        url: "https://fonts.gstatic.com/s/montserrat/v25/JTUHjIg1_i6t8kCHKm4V32VJOt5-q5pqnc09OA.ttf",
    },
    WebFont {
        name: "PlayfairDisplay",
        needles: &["playfair"],
        url: "https://fonts.gstatic.com/s/playfairdisplay/v30/nuFvL-7mveZDIs7J1C1SJH0SSatBLVz_pqcSZA.ttf",
    },
    WebFont {
        name: "DancingScript",
        needles: &["dancing", "cursive"],
        url: "https://fonts.gstatic.com/s/dancingscript/v24/If2cXEE97Iq6-mS6mdf7K-6--U20ZXTm.ttf",
    },
    WebFont {
        name: "Oswald",
        needles: &["oswald"],
        url: "https://fonts.gstatic.com/s/oswald/v49/TK3iWkUHHAIjg752GT8G.ttf",
    },
    WebFont {
        name: "OpenSans",
        needles: &["open sans"],
        url: "https://fonts.gstatic.com/s/opensans/v34/memvYaGs126MiZpBA-UvWbX2vVnXBbObj2OVTS-muw.ttf",
    },
];

/// Everything known about the font a piece of text should use.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FontDescriptor<'a> {
    /// Name embedded in the source document, possibly empty
    pub original_name: &'a str,
    pub family: Option<&'a str>,
    pub weight: Option<FontWeight>,
    pub style: Option<FontStyle>,
}

impl<'a> FontDescriptor<'a> {
    pub fn new(original_name: &'a str) -> Self {
        Self { original_name, ..Self::default() }
    }

    pub fn with_family(mut self, family: Option<&'a str>) -> Self {
        self.family = family;
        self
    }

    pub fn with_weight(mut self, weight: Option<FontWeight>) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_style(mut self, style: Option<FontStyle>) -> Self {
        self.style = style;
        self
    }

    /// Lower-cased concatenation of every descriptor string.
    fn haystack(&self) -> String {
        let weight = self.weight.map(|w| w.to_string());
        let style = self.style.map(|s| s.to_string());
        [Some(self.original_name), self.family, weight.as_deref(), style.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Pick one of the twelve standard fonts for `descriptor`.
pub fn standard_font(descriptor: &FontDescriptor<'_>) -> StandardFont {
    let haystack = descriptor.haystack();

    let bold = contains_any(&haystack, BOLD_NEEDLES) || descriptor.weight.is_some_and(|w| w.is_bold());
    let italic = contains_any(&haystack, ITALIC_NEEDLES);
    // "sans-serif" names a sans family.
    let serif_probe = haystack.replace("sans-serif", "").replace("sansserif", "");
    let family = if contains_any(&serif_probe, SERIF_NEEDLES) {
        StandardFamily::Times
    } else if contains_any(&haystack, MONO_NEEDLES) {
        StandardFamily::Courier
    } else {
        StandardFamily::Helvetica
    };

    StandardFont::from_parts(family, bold, italic)
}

/// The allowlisted web font a descriptor asks for, if any.
pub fn web_font(descriptor: &FontDescriptor<'_>) -> Option<&'static WebFont> {
    let haystack = descriptor.haystack();
    WEB_FONTS.iter().find(|font| contains_any(&haystack, font.needles))
}

/// Source of font program bytes.
pub trait FontFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTPS fetcher.
#[derive(Debug, Clone)]
pub struct UreqFontFetcher {
    agent: ureq::Agent,
}

impl UreqFontFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { agent: ureq::AgentBuilder::new().timeout(timeout).build() }
    }
}

impl FontFetcher for UreqFontFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .agent
            .get(url)
            .set("User-Agent", "inkpatch")
            .call()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let mut bytes = Vec::new();
        resp.into_reader().take(MAX_FONT_BYTES).read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// Resolves descriptors to fonts registered in one output document.
pub struct FontResolver<'f> {
    fetcher: Option<&'f dyn FontFetcher>,
    /// Parsed programs by URL; `None` records a failed fetch or parse
    fetched: HashMap<&'static str, Option<Arc<TrueTypeFont>>>,
    embedded: HashMap<&'static str, FontRef>,
    fallbacks: usize,
}

impl<'f> FontResolver<'f> {
    /// `None` disables web fonts entirely.
    pub fn new(fetcher: Option<&'f dyn FontFetcher>) -> Self {
        Self { fetcher, fetched: HashMap::new(), embedded: HashMap::new(), fallbacks: 0 }
    }

    /// Web-font requests that fell back to a standard font.
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    /// Always yields a usable font; failures degrade to a standard font.
    pub fn resolve(&mut self, writer: &mut DocumentWriter, descriptor: &FontDescriptor<'_>) -> FontRef {
        if let Some(web) = web_font(descriptor) {
            if let Some(font) = self.embed_web_font(writer, web) {
                return font;
            }
            self.fallbacks += 1;
        }
        writer.add_standard_font(standard_font(descriptor))
    }

    fn embed_web_font(&mut self, writer: &mut DocumentWriter, web: &'static WebFont) -> Option<FontRef> {
        if let Some(font) = self.embedded.get(web.url) {
            return Some(font.clone());
        }
        let fetcher = self.fetcher?;

        let program = self
            .fetched
            .entry(web.url)
            .or_insert_with(|| match load_web_font(fetcher, web) {
                Ok(font) => {
                    debug!(font = web.name, "web font fetched");
                    Some(Arc::new(font))
                }
                Err(err) => {
                    warn!(font = web.name, url = web.url, error = %err, "web font unavailable, using standard font");
                    None
                }
            })
            .clone()?;

        let font = writer.add_truetype_font(program);
        self.embedded.insert(web.url, font.clone());
        Some(font)
    }
}

fn load_web_font(fetcher: &dyn FontFetcher, web: &WebFont) -> Result<TrueTypeFont, String> {
    let bytes = fetcher.fetch(web.url).map_err(|err| err.to_string())?;
    TrueTypeFont::parse(web.name, bytes).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::WeightKeyword;
    use pdf_engine::fixtures;
    use pdf_engine::FontProgram;
    use std::cell::Cell;

    struct FailingFetcher {
        calls: Cell<usize>,
    }

    impl FontFetcher for FailingFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.set(self.calls.get() + 1);
            Err(FetchError::Network("offline".to_owned()))
        }
    }

    /// Answers with bytes that are not a font.
    struct GarbageFetcher;

    impl FontFetcher for GarbageFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Ok(b"<html>not a font</html>".to_vec())
        }
    }

    fn writer() -> DocumentWriter {
        DocumentWriter::load(&fixtures::single_run_pdf("Hello", 100.0, 700.0, 12.0)).unwrap()
    }

    #[test]
    fn arial_bold_is_bold_sans() {
        assert_eq!(standard_font(&FontDescriptor::new("Arial-BoldMT")), StandardFont::HelveticaBold);
    }

    #[test]
    fn times_italic_is_italic_serif() {
        assert_eq!(standard_font(&FontDescriptor::new("TimesNewRomanPS-ItalicMT")), StandardFont::TimesItalic);
    }

    #[test]
    fn overrides_alone_select_bold_italic_sans() {
        let descriptor = FontDescriptor::new("")
            .with_weight(Some(FontWeight::BOLD))
            .with_style(Some(FontStyle::Italic));

        assert_eq!(standard_font(&descriptor), StandardFont::HelveticaBoldOblique);
    }

    #[test]
    fn numeric_weight_counts_as_bold() {
        let descriptor = FontDescriptor::new("Helvetica").with_weight(Some(FontWeight::Numeric(800)));
        assert_eq!(standard_font(&descriptor), StandardFont::HelveticaBold);

        let light = FontDescriptor::new("Helvetica").with_weight(Some(FontWeight::Keyword(WeightKeyword::Lighter)));
        assert_eq!(standard_font(&light), StandardFont::Helvetica);
    }

    #[test]
    fn family_override_joins_the_original_name() {
        let descriptor = FontDescriptor::new("ABCDEF+Calibri").with_family(Some("Courier New"));
        assert_eq!(standard_font(&descriptor), StandardFont::Courier);

        let georgia = FontDescriptor::new("").with_family(Some("Georgia"));
        assert_eq!(standard_font(&georgia), StandardFont::TimesRoman);
    }

    #[test]
    fn sans_serif_stays_sans() {
        let descriptor = FontDescriptor::new("").with_family(Some("sans-serif"));
        assert_eq!(standard_font(&descriptor), StandardFont::Helvetica);
    }

    #[test]
    fn monospace_detection() {
        assert_eq!(standard_font(&FontDescriptor::new("FiraMono-Bold")), StandardFont::CourierBold);
        assert_eq!(standard_font(&FontDescriptor::new("Lucida Console")), StandardFont::Courier);
    }

    #[test]
    fn allowlist_matches_by_substring() {
        assert_eq!(web_font(&FontDescriptor::new("Inter-Regular")).map(|f| f.name), Some("Inter"));
        assert_eq!(
            web_font(&FontDescriptor::new("").with_family(Some("cursive"))).map(|f| f.name),
            Some("DancingScript")
        );
        assert_eq!(
            web_font(&FontDescriptor::new("").with_family(Some("Open Sans"))).map(|f| f.name),
            Some("OpenSans")
        );
        assert!(web_font(&FontDescriptor::new("Helvetica")).is_none());
    }

    #[test]
    fn failed_fetch_falls_back_and_is_cached() {
        let fetcher = FailingFetcher { calls: Cell::new(0) };
        let mut resolver = FontResolver::new(Some(&fetcher));
        let mut writer = writer();
        let descriptor = FontDescriptor::new("").with_family(Some("Roboto")).with_weight(Some(FontWeight::BOLD));

        let first = resolver.resolve(&mut writer, &descriptor);
        let second = resolver.resolve(&mut writer, &descriptor);

        assert!(matches!(first.program, FontProgram::Standard(StandardFont::HelveticaBold)));
        assert_eq!(first.id, second.id);
        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(resolver.fallbacks(), 2);
    }

    #[test]
    fn unparsable_font_falls_back() {
        let mut resolver = FontResolver::new(Some(&GarbageFetcher));
        let mut writer = writer();

        let font = resolver.resolve(&mut writer, &FontDescriptor::new("Montserrat-Italic"));

        assert!(matches!(font.program, FontProgram::Standard(StandardFont::HelveticaOblique)));
        assert_eq!(resolver.fallbacks(), 1);
    }

    #[test]
    fn no_fetcher_means_standard_fonts_only() {
        let mut resolver = FontResolver::new(None);
        let mut writer = writer();

        let font = resolver.resolve(&mut writer, &FontDescriptor::new("PlayfairDisplay-Bold"));

        assert!(matches!(font.program, FontProgram::Standard(StandardFont::TimesBold)));
    }
}
