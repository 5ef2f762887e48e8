//! Idle session retention
//!
//! A session's last activity is the newest modification time among its
//! directory, its record file and its uploads/previews directories. Sessions
//! idle for longer than the TTL are removed wholesale.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use super::layout::SessionDirs;
use crate::ident;

/// Remove idle sessions under `root`, returning the removed session ids.
///
/// Only directories named like issued session ids are considered. Sessions
/// for which `is_busy` answers true are left alone for the next sweep.
pub fn sweep_expired<F>(
    root: &Path,
    ttl: Duration,
    now: SystemTime,
    is_busy: F,
) -> io::Result<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut removed = Vec::new();

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let name = entry.file_name();
        let Some(session_id) = name.to_str() else {
            continue;
        };
        if !ident::is_valid_id(session_id) || is_busy(session_id) {
            continue;
        }

        let dirs = SessionDirs::new(root, session_id);
        let Some(last_active) = last_activity(&dirs) else {
            continue;
        };

        let idle = now.duration_since(last_active).unwrap_or_default();
        if idle <= ttl {
            continue;
        }

        match fs::remove_dir_all(&dirs.session) {
            Ok(()) => {
                tracing::info!(
                    session_id = %session_id,
                    idle_secs = idle.as_secs(),
                    "Removed idle session"
                );
                removed.push(session_id.to_string());
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to remove idle session");
            }
        }
    }

    Ok(removed)
}

fn last_activity(dirs: &SessionDirs) -> Option<SystemTime> {
    [
        dirs.session.as_path(),
        dirs.store_file.as_path(),
        dirs.uploads.as_path(),
        dirs.previews.as_path(),
    ]
    .into_iter()
    .filter_map(|path| fs::metadata(path).and_then(|m| m.modified()).ok())
    .max()
}
