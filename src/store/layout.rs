//! On-disk layout of a session
//!
//! ```text
//! <root>/<session-id>/
//!     uploads/<id>_<original name>.pdf
//!     previews/<page-id>.png
//!     <session-id>_store.json
//! ```

use std::path::{Path, PathBuf};

/// URL prefix under which the artifacts root is served
pub const ARTIFACTS_MOUNT: &str = "artifacts";

const UPLOADS_DIR: &str = "uploads";
const PREVIEWS_DIR: &str = "previews";

/// Resolved paths for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDirs {
    session_id: String,
    pub session: PathBuf,
    pub uploads: PathBuf,
    pub previews: PathBuf,
    pub store_file: PathBuf,
}

impl SessionDirs {
    pub fn new(root: &Path, session_id: &str) -> Self {
        let session = root.join(session_id);
        Self {
            session_id: session_id.to_string(),
            uploads: session.join(UPLOADS_DIR),
            previews: session.join(PREVIEWS_DIR),
            store_file: session.join(store_file_name(session_id)),
            session,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Directories to materialize, parents first
    pub fn all_dirs(&self) -> [&Path; 3] {
        [&self.session, &self.uploads, &self.previews]
    }

    /// Disk path of a page preview
    pub fn preview_file(&self, page_id: &str) -> PathBuf {
        self.previews.join(format!("{page_id}.png"))
    }

    /// Where the browser fetches a page preview
    pub fn preview_url(&self, page_id: &str) -> String {
        format!(
            "{ARTIFACTS_MOUNT}/{}/{PREVIEWS_DIR}/{page_id}.png",
            self.session_id
        )
    }
}

/// `<session-id>_store.json`
pub fn store_file_name(session_id: &str) -> String {
    format!("{session_id}_store.json")
}
