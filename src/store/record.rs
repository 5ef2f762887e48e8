//! Session metadata records
//!
//! The JSON shapes written to `<session-id>_store.json`. Field names are the
//! ones the dashboard script reads, so they are pinned with serde renames.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stored filename -> record
pub type RecordMap = BTreeMap<String, PdfRecord>;

// ============================================================================
// Page Records
// ============================================================================

/// Page orientation derived from the rendered bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    #[default]
    Portrait,
}

impl Orientation {
    /// Landscape when strictly wider than tall; square pages are portrait
    pub fn classify(width: u32, height: u32) -> Self {
        if width > height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }
}

/// Display state of a page in the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Show,
    Hide,
}

/// One rendered page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page identifier (also the preview file stem)
    pub id: String,

    /// 1-based page number
    #[serde(rename = "pagenumber")]
    pub page_number: u32,

    #[serde(rename = "pageorientation")]
    pub orientation: Orientation,

    /// Reserved for client-side editing
    #[serde(default)]
    pub flip: i32,

    /// Reserved for client-side editing
    #[serde(default)]
    pub rotate: i32,

    #[serde(default)]
    pub status: PageStatus,

    /// URL path of the PNG preview
    pub preview_path: String,
}

impl PageRecord {
    /// A freshly rendered page: no flip, no rotation, shown
    pub fn rendered(
        id: String,
        page_number: u32,
        orientation: Orientation,
        preview_path: String,
    ) -> Self {
        Self {
            id,
            page_number,
            orientation,
            flip: 0,
            rotate: 0,
            status: PageStatus::Show,
            preview_path,
        }
    }
}

// ============================================================================
// Document Records
// ============================================================================

/// Metadata for one uploaded PDF plus its pages.
///
/// Optional document-info fields are empty strings when the PDF omits them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfRecord {
    /// Stored filename (`<id>_<original name>`)
    pub filename: String,
    /// PDF header version, e.g. `1.7`
    pub version: String,
    pub page_count: u32,
    /// First page size, `"<w> x <h> points"`
    pub page_size: String,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub producer: String,
    pub creator: String,
    pub creation_date: String,
    pub modification_date: String,
    pub pages: Vec<PageRecord>,
}

/// Insert `record` under its filename, replacing any earlier entry
pub fn merge_into(map: &mut RecordMap, record: PdfRecord) {
    map.insert(record.filename.clone(), record);
}
