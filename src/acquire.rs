//! Segment acquisition.
//!
//! Resolves the ordered segment list (anchor-scan or accumulated uploads)
//! and streams every segment to local storage. Produces exactly the expected
//! number of ordered local paths or fails the whole call; partial retries
//! are a caller decision, never performed here.

use crate::cleanup::CleanupTracker;
use crate::error::{MergeError, Result};
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::transport::{MessageTransport, ScanDirection, SegmentLocator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// How many raw candidates a scan requests per expected segment. Transports
/// interleave non-media items in the source stream, so the window is padded.
const SCAN_WINDOW_FACTOR: usize = 8;

/// One acquired segment: a local file in assembly order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    pub locator: SegmentLocator,
    pub local_path: PathBuf,
    pub size: u64,
    pub order_index: usize,
}

/// Downloads the ordered segment set for one request.
pub struct SegmentAcquirer {
    transport: Arc<dyn MessageTransport>,
    sink: Arc<dyn ProgressSink>,
}

impl SegmentAcquirer {
    pub fn new(transport: Arc<dyn MessageTransport>, sink: Arc<dyn ProgressSink>) -> Self {
        Self { transport, sink }
    }

    /// Anchor-scan acquisition: walk the source stream from `anchor`,
    /// collect `expected` qualifying segments, restore chronological order,
    /// and download them all.
    pub async fn acquire_by_scan(
        &self,
        anchor: &SegmentLocator,
        direction: ScanDirection,
        expected: usize,
        work_dir: &Path,
        cleanup: &CleanupTracker,
    ) -> Result<Vec<SegmentRef>> {
        let window = expected.saturating_mul(SCAN_WINDOW_FACTOR);
        let candidates = self
            .transport
            .scan(anchor, direction, window)
            .await
            .map_err(|cause| MergeError::DownloadFailed { index: 0, cause })?;

        // Dedup by source identity, keeping walk order, then cap at expected.
        let mut seen = std::collections::HashSet::new();
        let mut picked: Vec<SegmentLocator> = Vec::with_capacity(expected);
        for candidate in candidates {
            if picked.len() == expected {
                break;
            }
            if seen.insert(candidate.id.clone()) {
                picked.push(candidate);
            }
        }

        if picked.len() < expected {
            return Err(MergeError::InsufficientSegments {
                found: picked.len(),
                expected,
            });
        }

        // A backward walk collected newest-first; restore chronological order.
        picked.sort_by_key(|locator| locator.sequence);

        self.download_all(&picked, work_dir, cleanup).await
    }

    /// Accumulation acquisition: the locators were collected up front; just
    /// download them in submission order.
    pub async fn acquire_collected(
        &self,
        locators: &[SegmentLocator],
        work_dir: &Path,
        cleanup: &CleanupTracker,
    ) -> Result<Vec<SegmentRef>> {
        self.download_all(locators, work_dir, cleanup).await
    }

    async fn download_all(
        &self,
        locators: &[SegmentLocator],
        work_dir: &Path,
        cleanup: &CleanupTracker,
    ) -> Result<Vec<SegmentRef>> {
        let mut segments = Vec::with_capacity(locators.len());

        for (index, locator) in locators.iter().enumerate() {
            self.sink.update(ProgressUpdate::Status(format!(
                "Collecting {}/{}",
                index + 1,
                locators.len()
            )));

            // Zero-padded prefix keeps the work dir listable in order.
            let dest = work_dir.join(format!("{:03}_{}", index, locator.file_name));
            cleanup.track(&dest);

            let sink = Arc::clone(&self.sink);
            let size = self
                .transport
                .download(locator, &dest, &move |done, total| {
                    sink.update(ProgressUpdate::Transfer { done, total });
                })
                .await
                .map_err(|cause| MergeError::DownloadFailed { index, cause })?;

            debug!(index, size, path = %dest.display(), "segment downloaded");

            segments.push(SegmentRef {
                locator: locator.clone(),
                local_path: dest,
                size,
                order_index: index,
            });
        }

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullSink;
    use crate::transport::LocalTransport;
    use assert_matches::assert_matches;

    fn seed(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), name.as_bytes()).unwrap();
        }
    }

    fn acquirer(transport: LocalTransport) -> SegmentAcquirer {
        SegmentAcquirer::new(Arc::new(transport), Arc::new(NullSink))
    }

    #[tokio::test]
    async fn scan_produces_exactly_expected_in_order() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
        let work = dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();

        let transport = LocalTransport::new(dir.path(), dir.path().join("out"));
        let anchor = transport.locator_for(&dir.path().join("b.mp4"));
        let cleanup = CleanupTracker::new();

        let segments = acquirer(transport)
            .acquire_by_scan(&anchor, ScanDirection::Forward, 2, &work, &cleanup)
            .await
            .unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].locator.file_name, "b.mp4");
        assert_eq!(segments[1].locator.file_name, "c.mp4");
        assert_eq!(segments[0].order_index, 0);
        assert!(segments.iter().all(|s| s.local_path.exists()));
    }

    #[tokio::test]
    async fn backward_scan_restores_chronological_order() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &["a.mp4", "b.mp4", "c.mp4"]);
        let work = dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();

        let transport = LocalTransport::new(dir.path(), dir.path().join("out"));
        let anchor = transport.locator_for(&dir.path().join("c.mp4"));
        let cleanup = CleanupTracker::new();

        let segments = acquirer(transport)
            .acquire_by_scan(&anchor, ScanDirection::Backward, 3, &work, &cleanup)
            .await
            .unwrap();

        let names: Vec<&str> = segments
            .iter()
            .map(|s| s.locator.file_name.as_str())
            .collect();
        assert_eq!(names, ["a.mp4", "b.mp4", "c.mp4"]);
    }

    #[tokio::test]
    async fn insufficient_candidates_fail_before_any_download() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &["a.mp4"]);
        let work = dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();

        let transport = LocalTransport::new(dir.path(), dir.path().join("out"));
        let anchor = transport.locator_for(&dir.path().join("a.mp4"));
        let cleanup = CleanupTracker::new();

        let err = acquirer(transport)
            .acquire_by_scan(&anchor, ScanDirection::Forward, 2, &work, &cleanup)
            .await
            .unwrap_err();

        assert_matches!(
            err,
            MergeError::InsufficientSegments {
                found: 1,
                expected: 2
            }
        );
        // No downloads happened, so cleanup has nothing to remove.
        assert_eq!(cleanup.run(), 0);
    }

    #[tokio::test]
    async fn failed_download_carries_its_index() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &["a.mp4"]);
        let work = dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();

        let transport = LocalTransport::new(dir.path(), dir.path().join("out"));
        let good = transport.locator_for(&dir.path().join("a.mp4"));
        let ghost = transport.locator_for(&dir.path().join("gone.mp4"));
        let cleanup = CleanupTracker::new();

        let err = acquirer(transport)
            .acquire_collected(&[good, ghost], &work, &cleanup)
            .await
            .unwrap_err();

        assert_matches!(err, MergeError::DownloadFailed { index: 1, .. });
        // The successful first download is tracked and removable.
        assert_eq!(cleanup.run(), 1);
    }
}
