//! Guaranteed release of a request's transient files.
//!
//! Every path the pipeline creates is tracked here at the moment of
//! creation; a terminal transition drains the tracker once. Deletion is
//! best-effort and idempotent: missing files are a no-op and failures are
//! logged as warnings, never propagated.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tracked-path registry for one merge request.
#[derive(Debug, Default)]
pub struct CleanupTracker {
    files: Mutex<Vec<PathBuf>>,
    work_dir: Mutex<Option<PathBuf>>,
}

impl CleanupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a file created for this request.
    pub fn track(&self, path: impl Into<PathBuf>) {
        self.files.lock().push(path.into());
    }

    /// Record the request-scoped work directory, removed after the files.
    pub fn set_work_dir(&self, dir: impl Into<PathBuf>) {
        *self.work_dir.lock() = Some(dir.into());
    }

    /// Delete every tracked path. Returns the number of files removed.
    ///
    /// Draining the registry makes a second invocation a no-op, so cleanup
    /// runs exactly once per tracked path no matter how the request ends.
    pub fn run(&self) -> usize {
        let files: Vec<PathBuf> = std::mem::take(&mut *self.files.lock());
        let mut removed = 0;

        for path in &files {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed transient file");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove transient file");
                }
            }
        }

        if let Some(dir) = self.work_dir.lock().take() {
            remove_work_dir(&dir);
        }

        removed
    }
}

fn remove_work_dir(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!(dir = %dir.display(), "removed work directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "failed to remove work directory"),
    }
}
