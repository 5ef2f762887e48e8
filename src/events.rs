//! Change-Notification Stream
//!
//! Polls a session's record file on a fixed interval and yields the compact
//! JSON text whenever its canonical content changes. Canonical means parsed
//! and re-serialized, so formatting differences never produce an event.
//!
//! Missing or unparsable files are skipped for that tick. The stream ends
//! when the shutdown signal flips or its sender goes away; a disconnected
//! client simply drops it.

use std::path::PathBuf;
use std::time::Duration;

use futures::stream::{self, Stream};
use sha2::{Digest, Sha256};
use tokio::sync::watch;

/// Tracks the last snapshot sent on one connection
#[derive(Debug)]
pub struct SnapshotWatcher {
    path: PathBuf,
    last_digest: Option<[u8; 32]>,
}

impl SnapshotWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_digest: None,
        }
    }

    /// Read the file once; return its compact JSON if it differs from the last one returned
    pub async fn poll_change(&mut self) -> Option<String> {
        let data = tokio::fs::read(&self.path).await.ok()?;
        let compact = canonicalize(&data)?;

        let digest: [u8; 32] = Sha256::digest(compact.as_bytes()).into();
        if self.last_digest == Some(digest) {
            return None;
        }

        tracing::trace!(
            path = %self.path.display(),
            digest = %hex::encode(&digest[..8]),
            "Snapshot changed"
        );
        self.last_digest = Some(digest);
        Some(compact)
    }
}

/// Parse and re-serialize without whitespace (object keys come out sorted)
pub fn canonicalize(data: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(data).ok()?;
    serde_json::to_string(&value).ok()
}

/// Stream of changed snapshots of the file at `path`.
///
/// The first tick happens immediately; later ticks are `interval` apart.
pub fn watch_snapshots(
    path: PathBuf,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> impl Stream<Item = String> {
    let state = (SnapshotWatcher::new(path), shutdown, true);

    stream::unfold(state, move |(mut watcher, mut shutdown, mut first)| async move {
        loop {
            if !first {
                // A dropped sender counts as shutdown
                let closed = tokio::select! {
                    _ = tokio::time::sleep(interval) => false,
                    changed = shutdown.changed() => changed.is_err(),
                };
                if closed {
                    return None;
                }
            }
            first = false;

            let stopping = *shutdown.borrow();
            if stopping {
                return None;
            }

            if let Some(snapshot) = watcher.poll_change().await {
                return Some((snapshot, (watcher, shutdown, first)));
            }
        }
    })
}
