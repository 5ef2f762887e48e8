//! Session artifact storage
//!
//! Directory layout, upload allocation, and the per-session JSON record of
//! uploaded documents and their rendered pages.

pub mod artifacts;
pub mod layout;
pub mod record;
pub mod sweep;

pub use artifacts::{read_records, ArtifactStore, StoreError, StoredUpload, MAX_NAME_ATTEMPTS};
pub use layout::{store_file_name, SessionDirs, ARTIFACTS_MOUNT};
pub use record::{merge_into, Orientation, PageRecord, PageStatus, PdfRecord, RecordMap};
