//! Error types for the PDF preview server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::render::RenderError;
use crate::store::StoreError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported file {0:?}: only .pdf files are accepted")]
    UnsupportedFile(String),

    #[error("No files in field \"pdfs\"")]
    NoFiles,

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Render error for {file_name}: {source}")]
    Render {
        file_name: String,
        #[source]
        source: RenderError,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn render(file_name: impl Into<String>, source: RenderError) -> Self {
        AppError::Render {
            file_name: file_name.into(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::UnsupportedFile(_) | AppError::NoFiles => {
                StatusCode::BAD_REQUEST
            }
            AppError::Multipart(e) => e.status(),
            AppError::Store(_) | AppError::Render { .. } | AppError::Internal(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::UnsupportedFile(_) => "unsupported_file",
            AppError::NoFiles => "no_files",
            AppError::Multipart(_) => "multipart_error",
            AppError::Store(_) => "storage_error",
            AppError::Render { .. } => "render_error",
            AppError::Internal(_) => "internal_error",
            AppError::Io(_) => "io_error",
        }
    }

    /// Text sent to the client; server-side failures are summarized
    fn client_message(&self) -> String {
        match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::UnsupportedFile(_) | AppError::NoFiles | AppError::Multipart(_) => {
                self.to_string()
            }
            AppError::Store(_) => "Failed to store upload".to_string(),
            AppError::Render { file_name, source } => {
                format!("{}: {}", file_name, source.client_message())
            }
            AppError::Internal(_) => "An internal error occurred".to_string(),
            AppError::Io(_) => "IO error".to_string(),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.kind(),
            message: self.client_message(),
        });

        (status, body).into_response()
    }
}
