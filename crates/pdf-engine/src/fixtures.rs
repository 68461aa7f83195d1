//! In-memory PDF builders for tests.
//!
//! Every document uses a single Helvetica resource named `F1`.

use crate::fonts::encode_win_ansi;
use crate::PageSize;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

pub const LETTER: PageSize = PageSize::new(612.0, 792.0);

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureText {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

impl FixtureText {
    pub fn new(text: &str, x: f32, y: f32, size: f32) -> Self {
        Self { text: text.to_owned(), x, y, size }
    }
}

/// One page per entry; each run is its own `BT ... ET` block.
#[derive(Debug, Clone, PartialEq)]
pub struct FixturePage {
    pub size: PageSize,
    pub runs: Vec<FixtureText>,
}

pub fn text_content(runs: &[FixtureText]) -> Vec<u8> {
    let operations: Vec<Operation> = runs
        .iter()
        .flat_map(|run| {
            [
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), run.size.into()]),
                Operation::new("Td", vec![run.x.into(), run.y.into()]),
                Operation::new("Tj", vec![Object::String(encode_win_ansi(&run.text), StringFormat::Literal)]),
                Operation::new("ET", vec![]),
            ]
        })
        .collect();

    Content { operations }.encode().expect("fixture content encodes")
}

fn helvetica(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    })
}

fn media_box(size: PageSize) -> Object {
    Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Real(size.width_pt), Object::Real(size.height_pt)])
}

/// Build a document from raw page content streams.
///
/// With `inherit` set, `/Resources` and `/MediaBox` live on the page tree
/// node instead of each page.
fn build(pages: &[(PageSize, Vec<u8>)], inherit: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = helvetica(&mut doc);
    let resources = || -> Dictionary {
        dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        }
    };

    let mut kids = Vec::new();
    for (size, content) in pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.clone()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if !inherit {
            page.set("MediaBox", media_box(*size));
            page.set("Resources", resources());
        }
        kids.push(Object::from(doc.add_object(page)));
    }

    let mut tree = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
    };
    if inherit {
        tree.set("MediaBox", media_box(pages.first().map_or(LETTER, |(size, _)| *size)));
        tree.set("Resources", resources());
    }
    doc.objects.insert(pages_id, Object::Dictionary(tree));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("fixture saves");
    buf
}

pub fn raw_content_pdf(size: PageSize, content: &[u8]) -> Vec<u8> {
    build(&[(size, content.to_vec())], false)
}

pub fn text_pdf(size: PageSize, runs: &[FixtureText]) -> Vec<u8> {
    build(&[(size, text_content(runs))], false)
}

pub fn single_run_pdf(text: &str, x: f32, y: f32, size: f32) -> Vec<u8> {
    text_pdf(LETTER, &[FixtureText::new(text, x, y, size)])
}

pub fn multi_page_pdf(pages: &[FixturePage]) -> Vec<u8> {
    let pages: Vec<_> = pages.iter().map(|page| (page.size, text_content(&page.runs))).collect();
    build(&pages, false)
}

/// Single page whose resources and media box are inherited from the tree.
pub fn inherited_resources_pdf(size: PageSize, runs: &[FixtureText]) -> Vec<u8> {
    build(&[(size, text_content(runs))], true)
}
