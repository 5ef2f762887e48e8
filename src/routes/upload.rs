//! Upload Routes
//!
//! POST /upload - multipart form, field `pdfs` (repeatable)
//!
//! Files are handled strictly in order. Each one is stored, rendered and
//! merged into the session record before the next part is read. The first
//! failure ends the request; files finished earlier in the batch stay.

use axum::{
    extract::{multipart::Field, Multipart, State},
    response::Html,
    Extension,
};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::render::render_document;
use crate::session::SessionId;
use crate::state::AppState;
use crate::store::{SessionDirs, StoredUpload};

/// Multipart field carrying the documents
pub const UPLOAD_FIELD: &str = "pdfs";

/// POST /upload
///
/// Returns one `<li>` fragment per stored file, concatenated.
pub async fn upload_pdfs(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    mut multipart: Multipart,
) -> Result<Html<String>> {
    let store = state.store();
    let mut session_dirs: Option<SessionDirs> = None;
    let mut fragments = String::new();
    let mut count = 0usize;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Upload part has no file name".to_string()))?;

        if !has_pdf_extension(&original_name) {
            return Err(AppError::UnsupportedFile(original_name));
        }

        // Directories appear with the first accepted file
        let dirs = match session_dirs.take() {
            Some(dirs) => dirs,
            None => store.ensure_session(session.as_str()).await?,
        };
        session_dirs = Some(dirs.clone());

        let mut upload = store.allocate_upload(&dirs, &original_name).await?;
        if let Err(e) = copy_field(field, &mut upload).await {
            store.remove_upload(&upload.path).await;
            return Err(e);
        }

        let fragment = file_fragment(upload.id(), upload.display_name());
        let StoredUpload {
            file_name, path, ..
        } = upload;

        tracing::info!(
            session_id = %session,
            file_name = %file_name,
            "Stored upload, rendering previews"
        );

        let record = match render_document(
            path.clone(),
            file_name.clone(),
            dirs.clone(),
            state.render_options(),
        )
        .await
        {
            Ok(record) => record,
            Err(e) => {
                store.remove_upload(&path).await;
                return Err(AppError::render(&original_name, e));
            }
        };

        let page_count = record.pages.len();
        let rollback = record.clone();
        if let Err(e) = store.merge_record(session.as_str(), record).await {
            store.remove_previews(&dirs, &rollback).await;
            store.remove_upload(&path).await;
            return Err(e.into());
        }

        tracing::info!(
            session_id = %session,
            file_name = %file_name,
            pages = page_count,
            "Upload processed"
        );

        fragments.push_str(&fragment);
        count += 1;
    }

    if count == 0 {
        return Err(AppError::NoFiles);
    }

    Ok(Html(fragments))
}

/// `.pdf` exactly, as the final extension (a bare ".pdf" included)
fn has_pdf_extension(name: &str) -> bool {
    name.ends_with(".pdf")
}

/// Stream a multipart field into the claimed upload file
async fn copy_field(mut field: Field<'_>, upload: &mut StoredUpload) -> Result<()> {
    let mut written = 0usize;

    while let Some(chunk) = field.chunk().await? {
        upload.file.write_all(&chunk).await?;
        written += chunk.len();
    }
    upload.file.flush().await?;

    tracing::debug!(file_name = %upload.file_name, bytes = written, "Upload written");
    Ok(())
}

/// List item for the dashboard, keyed by the upload's identifier
pub fn file_fragment(id: &str, label: &str) -> String {
    format!(
        concat!(
            r#"<li id="{}" class="file">"#,
            r#"<span class="name">{}</span>"#,
            r#"<span class="remove" onclick="this.closest('li').remove()">&times;</span>"#,
            "</li>\n"
        ),
        html_escape::encode_double_quoted_attribute(id),
        html_escape::encode_text(label),
    )
}
