//! Small helpers for walking lopdf object graphs.

use crate::PageSize;
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Follow a reference, if `object` is one. Dangling references yield `None`.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, object).and_then(|obj| obj.as_dict().ok())
}

/// Look up `key` on a page, walking up the page tree through `/Parent`.
pub(crate) fn resolve_inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = page_id;
    // Bounded walk; a malformed tree could loop.
    for _ in 0..64 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    resolve_inherited(doc, page_id, b"Resources").and_then(|obj| resolve_dict(doc, obj))
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> PageSize {
    resolve_inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .and_then(|array| {
            if array.len() != 4 {
                return None;
            }
            let x0 = number(&array[0])?;
            let y0 = number(&array[1])?;
            let x1 = number(&array[2])?;
            let y1 = number(&array[3])?;
            Some(PageSize::new((x1 - x0).abs(), (y1 - y0).abs()))
        })
        .unwrap_or_default()
}

/// Page object ids in document order.
pub(crate) fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}
