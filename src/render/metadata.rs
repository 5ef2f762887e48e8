//! Document metadata via the PDF object structure
//!
//! Read with lopdf, independently of the rasterizer: header version, page
//! count, the first page's declared size and the Info dictionary strings.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::error::RenderError;
use crate::store::PdfRecord;

/// Bound on `/Parent` hops when resolving inherited page attributes
const MAX_TREE_DEPTH: usize = 32;

/// Metadata that does not depend on rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    pub version: String,
    pub page_count: u32,
    /// `"<w> x <h> points"`, empty when the first page has no usable MediaBox
    pub page_size: String,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub producer: String,
    pub creator: String,
    pub creation_date: String,
    pub modification_date: String,
}

impl DocumentInfo {
    /// Start a record for `filename` with no pages yet
    pub fn into_record(self, filename: &str) -> PdfRecord {
        PdfRecord {
            filename: filename.to_string(),
            version: self.version,
            page_count: self.page_count,
            page_size: self.page_size,
            title: self.title,
            author: self.author,
            subject: self.subject,
            producer: self.producer,
            creator: self.creator,
            creation_date: self.creation_date,
            modification_date: self.modification_date,
            pages: Vec::new(),
        }
    }
}

/// Parse the document at `path` and collect its metadata
pub fn read_document_info(path: &Path) -> Result<DocumentInfo, RenderError> {
    let doc = Document::load(path).map_err(|e| RenderError::MetadataParse(e.to_string()))?;
    Ok(document_info(&doc))
}

/// Collect metadata from an already parsed document
pub fn document_info(doc: &Document) -> DocumentInfo {
    let pages = doc.get_pages();

    let page_size = pages
        .values()
        .next()
        .and_then(|&page_id| page_dimensions(doc, page_id))
        .map(|(width, height)| format_page_size(width, height))
        .unwrap_or_default();

    let mut info = DocumentInfo {
        version: doc.version.clone(),
        page_count: pages.len() as u32,
        page_size,
        ..Default::default()
    };

    if let Some(dict) = info_dictionary(doc) {
        let text = |key: &[u8]| info_string(doc, dict, key);
        info.title = text(b"Title");
        info.author = text(b"Author");
        info.subject = text(b"Subject");
        info.producer = text(b"Producer");
        info.creator = text(b"Creator");
        info.creation_date = text(b"CreationDate");
        info.modification_date = text(b"ModDate");
    }

    info
}

pub fn format_page_size(width: f32, height: f32) -> String {
    format!("{:.2} x {:.2} points", width, height)
}

/// Width and height of a page from its (possibly inherited) MediaBox,
/// swapped for pages rotated a quarter turn
fn page_dimensions(doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
    let media_box = inherited(doc, page_id, b"MediaBox")?;
    let coords: Vec<f32> = resolve(doc, media_box)
        .as_array()
        .ok()?
        .iter()
        .filter_map(|o| resolve(doc, o).as_float().ok())
        .collect();

    let [x0, y0, x1, y1] = coords[..] else {
        return None;
    };
    let (width, height) = ((x1 - x0).abs(), (y1 - y0).abs());

    let rotate = inherited(doc, page_id, b"Rotate")
        .and_then(|o| resolve(doc, o).as_i64().ok())
        .unwrap_or(0);

    if rotate.rem_euclid(180) == 90 {
        Some((height, width))
    } else {
        Some((width, height))
    }
}

/// Look up `key` on a page node, walking up `/Parent` links
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    resolve(doc, info).as_dict().ok()
}

/// A text entry of the Info dictionary, or `""` when absent or not a string
fn info_string(doc: &Document, dict: &Dictionary, key: &[u8]) -> String {
    match dict.get(key).map(|o| resolve(doc, o)) {
        Ok(Object::String(bytes, _)) => decode_text(bytes),
        _ => String::new(),
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, else Latin-1)
pub fn decode_text(bytes: &[u8]) -> String {
    let text = if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(rest).into_owned()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    };

    text.trim_end_matches('\0').to_string()
}
