//! Rendering pipeline errors

use thiserror::Error;

/// Failures while turning an uploaded PDF into previews and a record
#[derive(Debug, Error)]
pub enum RenderError {
    /// The rasterizer could not open the document
    #[error("Failed to open PDF for rendering: {0}")]
    Open(String),

    /// The structural parser could not read the document
    #[error("Failed to parse PDF structure: {0}")]
    MetadataParse(String),

    /// Rasterizing or writing one page failed
    #[error("Failed to render page {}: {reason}", .index + 1)]
    Page { index: usize, reason: String },

    #[error("Failed to generate page id: {0}")]
    Identifier(#[source] std::io::Error),

    #[error("Rendering timed out after {0} seconds")]
    Timeout(u64),

    #[error("Render task failed: {0}")]
    Join(String),

    /// Stopped by its caller, usually after a timeout
    #[error("Rendering cancelled after {completed} pages")]
    Cancelled { completed: usize },
}

impl RenderError {
    pub(crate) fn page(index: usize, reason: impl ToString) -> Self {
        RenderError::Page {
            index,
            reason: reason.to_string(),
        }
    }

    /// Message safe to return to the browser; internals stay in the logs
    pub fn client_message(&self) -> String {
        match self {
            RenderError::Open(_) => "Could not open PDF for rendering".to_string(),
            RenderError::MetadataParse(_) => "Could not read PDF structure".to_string(),
            RenderError::Page { index, .. } => format!("Could not render page {}", index + 1),
            RenderError::Identifier(_) => "Could not allocate page id".to_string(),
            RenderError::Timeout(secs) => format!("Rendering timed out after {} seconds", secs),
            RenderError::Join(_) => "Rendering failed".to_string(),
            RenderError::Cancelled { .. } => "Rendering was cancelled".to_string(),
        }
    }
}
