//! Session Artifact Store
//!
//! Owns the artifacts directory tree and every session's JSON record file.
//!
//! Record updates are read-modify-write cycles on a single file, so each
//! session gets an async mutex and all merges for that session run under
//! it. Writes go to a temporary file that is renamed over the record, which
//! keeps concurrent readers (the event stream) from seeing a torn file.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use super::layout::SessionDirs;
use super::record::{merge_into, PdfRecord, RecordMap};
use super::sweep;
use crate::ident::{self, ID_LEN};

/// Attempts at finding a free upload name before giving up
pub const MAX_NAME_ATTEMPTS: usize = 8;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No free upload name after {0} attempts")]
    NameExhausted(usize),

    #[error("Invalid upload file name: {0:?}")]
    InvalidName(String),

    #[error("Failed to generate identifier: {0}")]
    Identifier(#[source] io::Error),

    #[error("Failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Background task failed: {0}")]
    Join(String),
}

// ============================================================================
// Upload Allocation
// ============================================================================

/// A claimed destination for an uploaded file
#[derive(Debug)]
pub struct StoredUpload {
    /// `<id>_<basename>`
    pub file_name: String,
    pub path: PathBuf,
    /// Opened for writing; the file was created exclusively for this upload
    pub file: tokio::fs::File,
}

impl StoredUpload {
    /// The identifier prefix of the stored name
    pub fn id(&self) -> &str {
        &self.file_name[..ID_LEN]
    }

    /// The original name after the `<id>_` prefix
    pub fn display_name(&self) -> &str {
        self.file_name.get(ID_LEN + 1..).unwrap_or_default()
    }
}

// ============================================================================
// Artifact Store
// ============================================================================

#[derive(Clone)]
pub struct ArtifactStore {
    inner: Arc<ArtifactStoreInner>,
}

struct ArtifactStoreInner {
    /// Root holding one directory per session
    root: PathBuf,

    /// Per-session record locks
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ArtifactStoreInner {
                root: root.into(),
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn session_dirs(&self, session_id: &str) -> SessionDirs {
        SessionDirs::new(&self.inner.root, session_id)
    }

    /// Create the session, uploads and previews directories if missing
    pub async fn ensure_session(&self, session_id: &str) -> Result<SessionDirs, StoreError> {
        let dirs = self.session_dirs(session_id);

        for dir in dirs.all_dirs() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StoreError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        Ok(dirs)
    }

    /// Claim a fresh `<id>_<basename>` path under the uploads directory
    pub async fn allocate_upload(
        &self,
        dirs: &SessionDirs,
        original_name: &str,
    ) -> Result<StoredUpload, StoreError> {
        self.allocate_upload_with(dirs, original_name, &mut OsRng).await
    }

    /// Like [`allocate_upload`](Self::allocate_upload) with an explicit random source
    pub async fn allocate_upload_with<R: RngCore + Send>(
        &self,
        dirs: &SessionDirs,
        original_name: &str,
        rng: &mut R,
    ) -> Result<StoredUpload, StoreError> {
        let base_name = Path::new(original_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| StoreError::InvalidName(original_name.to_string()))?;

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let id = ident::generate(rng, ID_LEN).map_err(StoreError::Identifier)?;
            let file_name = format!("{id}_{base_name}");
            let path = dirs.uploads.join(&file_name);

            // create_new makes the existence check and the claim a single step
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    return Ok(StoredUpload {
                        file_name,
                        path,
                        file,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(
                        session_id = %dirs.session_id(),
                        file_name = %file_name,
                        attempt,
                        "Upload name taken, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::NameExhausted(MAX_NAME_ATTEMPTS))
    }

    /// Delete an upload that never made it into the record
    pub async fn remove_upload(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload");
            }
        }
    }

    /// Delete the preview files of a record that could not be stored
    pub async fn remove_previews(&self, dirs: &SessionDirs, record: &PdfRecord) {
        for page in &record.pages {
            let path = dirs.preview_file(&page.id);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove preview");
                }
            }
        }
    }

    /// Merge `record` into the session's record file under the session lock
    pub async fn merge_record(
        &self,
        session_id: &str,
        record: PdfRecord,
    ) -> Result<RecordMap, StoreError> {
        let guard = self.lock_for(session_id).lock_owned().await;
        let store_file = self.session_dirs(session_id).store_file;

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let mut records = read_records(&store_file);
            merge_into(&mut records, record);
            write_records(&store_file, &records)?;
            Ok::<_, StoreError>(records)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Current records of a session; missing or malformed files read as empty
    pub async fn load_records(&self, session_id: &str) -> Result<RecordMap, StoreError> {
        let store_file = self.session_dirs(session_id).store_file;
        tokio::task::spawn_blocking(move || read_records(&store_file))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))
    }

    /// Remove sessions idle for longer than `ttl`, skipping any mid-update
    pub async fn sweep_expired(&self, ttl: Duration) -> Result<Vec<String>, StoreError> {
        let store = self.clone();

        let removed = tokio::task::spawn_blocking(move || {
            sweep::sweep_expired(store.root(), ttl, SystemTime::now(), |id| store.is_busy(id))
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))??;

        self.prune_locks();
        Ok(removed)
    }

    fn lock_for(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.inner.locks.lock();
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn is_busy(&self, session_id: &str) -> bool {
        self.inner
            .locks
            .lock()
            .get(session_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Drop lock entries nobody is holding or waiting on
    fn prune_locks(&self) {
        self.inner
            .locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

// ============================================================================
// Record File IO
// ============================================================================

/// Read a record file, treating absence or corruption as an empty map
pub fn read_records(path: &Path) -> RecordMap {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return RecordMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable record file, starting empty");
            return RecordMap::new();
        }
    };

    serde_json::from_slice(&data).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Malformed record file, starting empty");
        RecordMap::new()
    })
}

/// Replace the record file with `records` as indented JSON
pub fn write_records(path: &Path, records: &RecordMap) -> Result<(), StoreError> {
    let data = serde_json::to_vec_pretty(records)?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::test_rng::ScriptedRng;
    use crate::store::record::{Orientation, PageRecord};
    use tempfile::TempDir;

    const SESSION: &str = "sessionSESSION1";

    fn record(filename: &str) -> PdfRecord {
        PdfRecord {
            filename: filename.to_string(),
            version: "1.4".to_string(),
            page_count: 1,
            pages: vec![PageRecord::rendered(
                "pagepagepage001".to_string(),
                1,
                Orientation::Landscape,
                "artifacts/sessionSESSION1/previews/pagepagepage001.png".to_string(),
            )],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ensure_session_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path().join("nested/artifacts"));

        let dirs = store.ensure_session(SESSION).await.unwrap();

        assert!(dirs.session.is_dir());
        assert!(dirs.uploads.is_dir());
        assert!(dirs.previews.is_dir());
        assert!(!dirs.store_file.exists());

        // Idempotent
        store.ensure_session(SESSION).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_session_reports_create_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("artifacts");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = ArtifactStore::new(&blocker);
        let result = store.ensure_session(SESSION).await;

        assert!(matches!(result, Err(StoreError::CreateDir { .. })));
    }

    #[tokio::test]
    async fn test_allocate_upload_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let dirs = store.ensure_session(SESSION).await.unwrap();

        let upload = store.allocate_upload(&dirs, "report.pdf").await.unwrap();

        assert_eq!(upload.file_name.len(), ID_LEN + 1 + "report.pdf".len());
        assert!(upload.file_name.ends_with("_report.pdf"));
        assert!(ident::is_valid_id(upload.id()));
        assert_eq!(upload.display_name(), "report.pdf");
        assert!(upload.path.starts_with(&dirs.uploads));
        assert!(upload.path.exists());
    }

    #[tokio::test]
    async fn test_allocate_upload_strips_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let dirs = store.ensure_session(SESSION).await.unwrap();

        let upload = store
            .allocate_upload(&dirs, "../../escape/report.pdf")
            .await
            .unwrap();

        assert_eq!(upload.display_name(), "report.pdf");
        assert_eq!(upload.path.parent().unwrap(), dirs.uploads);
    }

    #[tokio::test]
    async fn test_allocate_upload_skips_taken_name() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let dirs = store.ensure_session(SESSION).await.unwrap();

        let reserved = "RESERVEDRESERVE";
        let free = "FREEFREEFREEFRE";
        let existing = dirs.uploads.join(format!("{reserved}_a.pdf"));
        std::fs::write(&existing, b"original").unwrap();

        let mut rng = ScriptedRng::for_ids([reserved, free]);
        let upload = store
            .allocate_upload_with(&dirs, "a.pdf", &mut rng)
            .await
            .unwrap();

        assert_eq!(upload.file_name, format!("{free}_a.pdf"));
        assert_ne!(upload.path, existing);
        assert_eq!(std::fs::read(&existing).unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_allocate_upload_gives_up_after_cap() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let dirs = store.ensure_session(SESSION).await.unwrap();

        let reserved = "RESERVEDRESERVE";
        std::fs::write(dirs.uploads.join(format!("{reserved}_a.pdf")), b"x").unwrap();

        let mut rng = ScriptedRng::for_ids(std::iter::repeat(reserved).take(MAX_NAME_ATTEMPTS));
        let result = store.allocate_upload_with(&dirs, "a.pdf", &mut rng).await;

        assert!(matches!(result, Err(StoreError::NameExhausted(n)) if n == MAX_NAME_ATTEMPTS));
    }

    #[tokio::test]
    async fn test_allocate_upload_propagates_rng_failure() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let dirs = store.ensure_session(SESSION).await.unwrap();

        let mut rng = ScriptedRng::new([0u8; 0]);
        let result = store.allocate_upload_with(&dirs, "a.pdf", &mut rng).await;

        assert!(matches!(result, Err(StoreError::Identifier(_))));
    }

    #[tokio::test]
    async fn test_merge_record_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        store.ensure_session(SESSION).await.unwrap();

        store.merge_record(SESSION, record("AAAAAAAAAAAAAAA_a.pdf")).await.unwrap();
        store.merge_record(SESSION, record("AAAAAAAAAAAAAAA_a.pdf")).await.unwrap();
        store.merge_record(SESSION, record("BBBBBBBBBBBBBBB_b.pdf")).await.unwrap();

        let records = store.load_records(SESSION).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records["AAAAAAAAAAAAAAA_a.pdf"], record("AAAAAAAAAAAAAAA_a.pdf"));

        // Indented on disk, no leftover temp file
        let raw = std::fs::read_to_string(store.session_dirs(SESSION).store_file).unwrap();
        assert!(raw.contains("\n  \"AAAAAAAAAAAAAAA_a.pdf\""));
        let leftovers: Vec<_> = std::fs::read_dir(store.session_dirs(SESSION).session)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_merge_record_recovers_from_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let dirs = store.ensure_session(SESSION).await.unwrap();
        std::fs::write(&dirs.store_file, b"{ not json").unwrap();

        assert!(store.load_records(SESSION).await.unwrap().is_empty());

        let records = store
            .merge_record(SESSION, record("AAAAAAAAAAAAAAA_a.pdf"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_merges_are_not_lost() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        store.ensure_session(SESSION).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .merge_record(SESSION, record(&format!("{i:015}_doc.pdf")))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.load_records(SESSION).await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_remove_upload_ignores_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let dirs = store.ensure_session(SESSION).await.unwrap();

        let upload = store.allocate_upload(&dirs, "a.pdf").await.unwrap();
        let path = upload.path.clone();
        drop(upload);

        store.remove_upload(&path).await;
        assert!(!path.exists());
        store.remove_upload(&path).await;
    }

    #[tokio::test]
    async fn test_remove_previews_of_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path());
        let dirs = store.ensure_session(SESSION).await.unwrap();

        let preview = dirs.preview_file("pagepagepage001");
        std::fs::write(&preview, b"png").unwrap();

        store.remove_previews(&dirs, &record("AAAAAAAAAAAAAAA_a.pdf")).await;
        assert!(!preview.exists());
    }
}
