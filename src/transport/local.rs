//! Filesystem transport.
//!
//! Treats a directory as the source stream (entries ordered by name) and
//! another directory as the delivery outbox. This is what the one-shot CLI
//! merge uses, and it doubles as the reference transport for tests.

use super::{
    DeliveryReceipt, MessageTransport, ScanDirection, SegmentLocator, TransferProgress,
    TransportError, UploadMetadata,
};
use crate::delivery::Channel;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Extensions treated as qualifying media during a scan.
const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "ts", "webm", "m4v"];

const COPY_CHUNK: usize = 256 * 1024;

/// Transport over local directories.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    source_dir: PathBuf,
    outbox_dir: PathBuf,
}

impl LocalTransport {
    pub fn new(source_dir: impl Into<PathBuf>, outbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            outbox_dir: outbox_dir.into(),
        }
    }

    /// Build a locator for a path, for use as a scan anchor or direct input.
    ///
    /// Absolute paths are used as-is; relative ones resolve against the
    /// source directory.
    pub fn locator_for(&self, path: &Path) -> SegmentLocator {
        SegmentLocator {
            id: path.to_string_lossy().to_string(),
            sequence: 0,
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "segment".to_string()),
            size_hint: self.resolve(&path.to_string_lossy()).metadata().ok().map(|m| m.len()),
        }
    }

    fn resolve(&self, id: &str) -> PathBuf {
        let path = Path::new(id);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.source_dir.join(path)
        }
    }

    fn is_media(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| MEDIA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Name-sorted media entries of the source directory.
    fn list_media(&self) -> Result<Vec<PathBuf>, TransportError> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&self.source_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && Self::is_media(p))
            .collect();
        entries.sort();
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl MessageTransport for LocalTransport {
    async fn scan(
        &self,
        anchor: &SegmentLocator,
        direction: ScanDirection,
        limit: usize,
    ) -> Result<Vec<SegmentLocator>, TransportError> {
        let entries = self.list_media()?;
        let anchor_path = self.resolve(&anchor.id);

        let position = entries
            .iter()
            .position(|p| *p == anchor_path)
            .ok_or_else(|| TransportError::NotFound(anchor.id.clone()))?;

        let walk: Vec<(usize, &PathBuf)> = match direction {
            ScanDirection::Forward => entries
                .iter()
                .enumerate()
                .skip(position)
                .take(limit)
                .collect(),
            ScanDirection::Backward => entries
                .iter()
                .enumerate()
                .take(position + 1)
                .rev()
                .take(limit)
                .collect(),
        };

        Ok(walk
            .into_iter()
            .map(|(seq, path)| SegmentLocator {
                id: path.to_string_lossy().to_string(),
                sequence: seq as i64,
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                size_hint: path.metadata().ok().map(|m| m.len()),
            })
            .collect())
    }

    async fn download(
        &self,
        locator: &SegmentLocator,
        dest: &Path,
        on_progress: TransferProgress<'_>,
    ) -> Result<u64, TransportError> {
        let src_path = self.resolve(&locator.id);
        let mut src = tokio::fs::File::open(&src_path)
            .await
            .map_err(|_| TransportError::NotFound(locator.id.clone()))?;
        let total = src.metadata().await.ok().map(|m| m.len());

        let mut dst = tokio::fs::File::create(dest).await?;
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut done = 0u64;

        loop {
            let n = src.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n]).await?;
            done += n as u64;
            on_progress(done, total);
        }
        dst.flush().await?;

        Ok(done)
    }

    async fn upload(
        &self,
        path: &Path,
        channel: Channel,
        metadata: &UploadMetadata,
    ) -> Result<DeliveryReceipt, TransportError> {
        let channel_dir = self.outbox_dir.join(match channel {
            Channel::Direct => "direct",
            Channel::Relay => "relay",
        });
        tokio::fs::create_dir_all(&channel_dir).await?;

        let dest = channel_dir.join(&metadata.file_name);
        tokio::fs::copy(path, &dest)
            .await
            .map_err(|e| TransportError::Transfer(e.to_string()))?;

        Ok(DeliveryReceipt {
            channel,
            reference: dest.to_string_lossy().to_string(),
        })
    }
}
