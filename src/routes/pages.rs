//! Page, asset and diagnostic routes

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::assets::{self, INDEX_HTML};
use crate::error::{AppError, Result};
use crate::ident::{self, DEBUG_ID_LEN};

/// GET /
pub async fn dashboard() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /id - a fresh identifier, for eyeballing the generator
pub async fn debug_id() -> Result<String> {
    let id = ident::generate_id(DEBUG_ID_LEN)
        .map_err(|e| AppError::Internal(format!("identifier generation failed: {e}")))?;
    Ok(format!("Nano ID is {id}\n"))
}

/// GET /static/*path
pub async fn static_file(Path(path): Path<String>) -> Response {
    match assets::static_asset(&path) {
        Some(asset) => (
            [(header::CONTENT_TYPE, asset.content_type)],
            asset.bytes,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
