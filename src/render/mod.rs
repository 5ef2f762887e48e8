//! PDF Rendering Pipeline
//!
//! Turns a stored upload into a [`PdfRecord`]: structural metadata from
//! lopdf, one PNG preview per page from MuPDF.
//!
//! The pipeline only creates new preview files and returns the record by
//! value; merging it into the session record is the store's job.
//!
//! If any page fails, the previews already written for this document are
//! removed before the error is returned. The same holds for a render that
//! outlives its timeout: it is cancelled between pages and its previews go
//! with it.

mod error;
pub mod metadata;
pub mod raster;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub use error::RenderError;
pub use metadata::{read_document_info, DocumentInfo};
pub use raster::Rasterizer;

use crate::ident::{self, ID_LEN};
use crate::store::{Orientation, PageRecord, PdfRecord, SessionDirs};

/// Attempts at finding an unused page id
const MAX_PAGE_ID_ATTEMPTS: usize = 8;

/// Tunables for one rendering run
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Preview resolution (72 = one pixel per point)
    pub dpi: f32,
    /// Upper bound on rendering a whole document
    pub timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dpi: 300.0,
            timeout: Duration::from_secs(120),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Render every page of `pdf_path` into `dirs.previews` and build its record.
///
/// Blocking; call through [`render_document`] from async code. `cancel` is
/// checked before each page and once more before the previews are kept.
pub fn render(
    pdf_path: &Path,
    file_name: &str,
    dirs: &SessionDirs,
    dpi: f32,
    cancel: &AtomicBool,
) -> Result<PdfRecord, RenderError> {
    let rasterizer = Rasterizer::open(pdf_path)?;
    let mut record = read_document_info(pdf_path)?.into_record(file_name);

    let mut batch = PreviewBatch::default();

    for index in 0..rasterizer.page_count() {
        if cancel.load(Ordering::Acquire) {
            return Err(RenderError::Cancelled { completed: index });
        }

        let image = rasterizer.render_page(index, dpi)?;
        let (page_id, path) = write_preview(dirs, &image).map_err(|e| match e {
            PreviewWriteError::Identifier(e) => RenderError::Identifier(e),
            PreviewWriteError::Write(reason) => RenderError::page(index, reason),
        })?;
        batch.push(path);

        tracing::debug!(
            file_name = %file_name,
            page = index + 1,
            width = image.width(),
            height = image.height(),
            "Rendered page preview"
        );

        let preview_path = dirs.preview_url(&page_id);
        record.pages.push(PageRecord::rendered(
            page_id,
            index as u32 + 1,
            Orientation::classify(image.width(), image.height()),
            preview_path,
        ));
    }

    if cancel.load(Ordering::Acquire) {
        return Err(RenderError::Cancelled {
            completed: record.pages.len(),
        });
    }

    batch.commit();
    Ok(record)
}

/// Run [`render`] on the blocking pool under the configured timeout
pub async fn render_document(
    pdf_path: PathBuf,
    file_name: String,
    dirs: SessionDirs,
    options: RenderOptions,
) -> Result<PdfRecord, RenderError> {
    let cancel = Arc::new(AtomicBool::new(false));
    let mut task = tokio::task::spawn_blocking({
        let cancel = Arc::clone(&cancel);
        let dirs = dirs.clone();
        move || render(&pdf_path, &file_name, &dirs, options.dpi, &cancel)
    });

    match timeout(options.timeout, &mut task).await {
        Ok(joined) => joined.map_err(|e| RenderError::Join(e.to_string()))?,
        Err(_) => {
            // MuPDF cannot be interrupted mid-page; the task stops at the next page
            cancel.store(true, Ordering::Release);
            tokio::spawn(discard_late_render(task, dirs));
            Err(RenderError::Timeout(options.timeout.as_secs()))
        }
    }
}

/// Wait out a timed-out render and delete anything it still produced
async fn discard_late_render(
    task: JoinHandle<Result<PdfRecord, RenderError>>,
    dirs: SessionDirs,
) {
    match task.await {
        // Finished between the deadline and the cancel flag
        Ok(Ok(record)) => {
            for page in &record.pages {
                let path = dirs.preview_file(&page.id);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to remove late preview"
                    );
                }
            }
        }
        Ok(Err(e)) => tracing::debug!(error = %e, "Timed-out render stopped"),
        Err(e) => tracing::warn!(error = %e, "Timed-out render task failed"),
    }
}

// ============================================================================
// Preview Files
// ============================================================================

enum PreviewWriteError {
    Identifier(io::Error),
    Write(String),
}

/// Encode `image` as PNG under a fresh page id, returning the id and path
fn write_preview(
    dirs: &SessionDirs,
    image: &RgbImage,
) -> Result<(String, PathBuf), PreviewWriteError> {
    let (page_id, path, file) = claim_preview(dirs)?;

    let mut writer = BufWriter::new(file);
    let encoded = image
        .write_to(&mut writer, image::ImageFormat::Png)
        .map_err(|e| e.to_string())
        .and_then(|()| writer.into_inner().map_err(|e| e.to_string()))
        .and_then(|file| file.sync_all().map_err(|e| e.to_string()));

    match encoded {
        Ok(()) => Ok((page_id, path)),
        Err(reason) => {
            let _ = fs::remove_file(&path);
            Err(PreviewWriteError::Write(reason))
        }
    }
}

fn claim_preview(dirs: &SessionDirs) -> Result<(String, PathBuf, File), PreviewWriteError> {
    for _ in 0..MAX_PAGE_ID_ATTEMPTS {
        let page_id = ident::generate_id(ID_LEN).map_err(PreviewWriteError::Identifier)?;
        let path = dirs.preview_file(&page_id);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((page_id, path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(PreviewWriteError::Write(e.to_string())),
        }
    }

    Err(PreviewWriteError::Write(format!(
        "no free page id after {MAX_PAGE_ID_ATTEMPTS} attempts"
    )))
}

/// Previews written for one document; removed on drop unless committed
#[derive(Default)]
struct PreviewBatch {
    paths: Vec<PathBuf>,
}

impl PreviewBatch {
    fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    fn commit(mut self) {
        self.paths.clear();
    }
}

impl Drop for PreviewBatch {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial preview");
            }
        }
    }
}

// ============================================================================
// Test Documents
// ============================================================================
