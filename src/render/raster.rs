//! Page rasterization with MuPDF
//!
//! MuPDF's context is not thread-safe, so a [`Rasterizer`] lives entirely on
//! the blocking thread that renders one document. The underlying document
//! is released when the rasterizer drops, on success and failure alike.

use std::path::Path;

use image::RgbImage;
use mupdf::{Colorspace, Document, Matrix};

use super::error::RenderError;

/// Points per inch in PDF user space
const POINTS_PER_INCH: f32 = 72.0;

/// Bounds for the render resolution
const MIN_DPI: f32 = 18.0;
const MAX_DPI: f32 = 600.0;

pub struct Rasterizer {
    doc: Document,
    page_count: usize,
}

impl Rasterizer {
    /// Open a document for rasterization
    pub fn open(path: &Path) -> Result<Self, RenderError> {
        let path_str = path.to_string_lossy();
        let doc = Document::open(&*path_str).map_err(|e| RenderError::Open(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| RenderError::Open(e.to_string()))?;

        Ok(Self {
            doc,
            page_count: page_count.max(0) as usize,
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Render page `index` (0-based) to an RGB bitmap at `dpi`
    pub fn render_page(&self, index: usize, dpi: f32) -> Result<RgbImage, RenderError> {
        if index >= self.page_count {
            return Err(RenderError::page(
                index,
                format!("document has {} pages", self.page_count),
            ));
        }

        let page = self
            .doc
            .load_page(index as i32)
            .map_err(|e| RenderError::page(index, e))?;

        let scale = dpi.clamp(MIN_DPI, MAX_DPI) / POINTS_PER_INCH;
        let matrix = Matrix::new_scale(scale, scale);
        let colorspace = Colorspace::device_rgb();

        let pixmap = page
            .to_pixmap(&matrix, &colorspace, false, true)
            .map_err(|e| RenderError::page(index, e))?;

        pixmap_to_rgb(
            pixmap.width() as u32,
            pixmap.height() as u32,
            pixmap.n() as usize,
            pixmap.samples(),
        )
        .ok_or_else(|| RenderError::page(index, "pixmap buffer does not match its dimensions"))
    }
}

/// Repack interleaved samples with `n` components per pixel into RGB
fn pixmap_to_rgb(width: u32, height: u32, n: usize, samples: &[u8]) -> Option<RgbImage> {
    if n < 3 {
        return None;
    }

    let pixels = (width as usize) * (height as usize);
    if samples.len() < pixels * n {
        return None;
    }

    let rgb: Vec<u8> = samples
        .chunks_exact(n)
        .take(pixels)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();

    RgbImage::from_raw(width, height, rgb)
}
