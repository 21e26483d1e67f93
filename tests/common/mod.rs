//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] wiring a scripted transport, a recording
//! progress sink, a byte-concatenating assembler, and an in-memory history
//! store into a full [`MergePipeline`] over a temp work directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use reelstitch::assembly::Assembler;
use reelstitch::config::Config;
use reelstitch::delivery::Channel;
use reelstitch::error::{AssemblyFailure, MergeError};
use reelstitch::history::SqliteHistory;
use reelstitch::pipeline::MergePipeline;
use reelstitch::progress::{ProgressSink, ProgressUpdate};
use reelstitch::transport::{
    DeliveryReceipt, MessageTransport, ScanDirection, SegmentLocator, SettingsProvider,
    StaticSettings, TransferProgress, TransportError, UploadMetadata,
};

/// A delivery recorded by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub channel: Channel,
    pub file_name: String,
    pub caption: String,
    pub bytes: Vec<u8>,
}

/// Transport whose scan results, segment bytes, and failures are scripted
/// by the test.
#[derive(Default)]
pub struct ScriptedTransport {
    segments: Mutex<HashMap<String, Vec<u8>>>,
    scan_results: Mutex<Vec<SegmentLocator>>,
    fail_download_id: Mutex<Option<String>>,
    fail_uploads: Mutex<bool>,
    pub uploads: Mutex<Vec<RecordedUpload>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a segment and return its locator.
    pub fn add_segment(&self, id: &str, sequence: i64, bytes: &[u8]) -> SegmentLocator {
        self.segments.lock().insert(id.to_string(), bytes.to_vec());
        SegmentLocator {
            id: id.to_string(),
            sequence,
            file_name: format!("{id}.mp4"),
            size_hint: Some(bytes.len() as u64),
        }
    }

    /// Script what the next scan returns, in walk order.
    pub fn set_scan_results(&self, locators: Vec<SegmentLocator>) {
        *self.scan_results.lock() = locators;
    }

    /// Make the download of one segment fail.
    pub fn fail_download_of(&self, id: &str) {
        *self.fail_download_id.lock() = Some(id.to_string());
    }

    /// Make every upload fail.
    pub fn fail_uploads(&self) {
        *self.fail_uploads.lock() = true;
    }
}

#[async_trait::async_trait]
impl MessageTransport for ScriptedTransport {
    async fn scan(
        &self,
        _anchor: &SegmentLocator,
        _direction: ScanDirection,
        limit: usize,
    ) -> Result<Vec<SegmentLocator>, TransportError> {
        let results = self.scan_results.lock().clone();
        Ok(results.into_iter().take(limit).collect())
    }

    async fn download(
        &self,
        locator: &SegmentLocator,
        dest: &Path,
        on_progress: TransferProgress<'_>,
    ) -> Result<u64, TransportError> {
        if self.fail_download_id.lock().as_deref() == Some(locator.id.as_str()) {
            return Err(TransportError::Transfer("scripted failure".to_string()));
        }

        let bytes = self
            .segments
            .lock()
            .get(&locator.id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(locator.id.clone()))?;

        let total = bytes.len() as u64;
        tokio::fs::write(dest, &bytes).await?;
        on_progress(total, Some(total));
        Ok(total)
    }

    async fn upload(
        &self,
        path: &Path,
        channel: Channel,
        metadata: &UploadMetadata,
    ) -> Result<DeliveryReceipt, TransportError> {
        if *self.fail_uploads.lock() {
            return Err(TransportError::Transfer("scripted upload failure".to_string()));
        }

        let bytes = tokio::fs::read(path).await?;
        self.uploads.lock().push(RecordedUpload {
            channel,
            file_name: metadata.file_name.clone(),
            caption: metadata.caption.clone(),
            bytes,
        });

        Ok(DeliveryReceipt {
            channel,
            reference: format!("upload-{}", self.uploads.lock().len()),
        })
    }
}

/// Sink recording every update it receives, unthrottled.
#[derive(Default)]
pub struct RecordingSink {
    pub updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingSink {
    pub fn statuses(&self) -> Vec<String> {
        self.updates
            .lock()
            .iter()
            .filter_map(|u| match u {
                ProgressUpdate::Status(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn saw_done(&self) -> bool {
        self.updates
            .lock()
            .iter()
            .any(|u| matches!(u, ProgressUpdate::Done))
    }
}

impl ProgressSink for RecordingSink {
    fn update(&self, update: ProgressUpdate) {
        self.updates.lock().push(update);
    }
}

/// Assembler that concatenates the manifest's files byte-for-byte, exactly
/// preserving order. Stands in for ffmpeg behind the [`Assembler`] seam.
pub struct ConcatAssembler;

#[async_trait::async_trait]
impl Assembler for ConcatAssembler {
    async fn assemble(
        &self,
        manifest: &Path,
        _inputs: &[PathBuf],
        output: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<(), MergeError> {
        // Consume the manifest rather than the input list; this exercises
        // the manifest builder's ordering end to end.
        let content = tokio::fs::read_to_string(manifest).await?;
        let mut merged = Vec::new();
        for line in content.lines().skip(1) {
            let path = line
                .trim_start_matches("file '")
                .trim_end_matches('\'');
            merged.extend(tokio::fs::read(path).await?);
        }
        tokio::fs::write(output, merged).await?;
        sink.update(ProgressUpdate::MediaTime {
            elapsed: std::time::Duration::from_secs(1),
        });
        Ok(())
    }
}

/// Assembler that always fails like a non-zero ffmpeg exit.
pub struct FailingAssembler {
    pub tail: String,
}

#[async_trait::async_trait]
impl Assembler for FailingAssembler {
    async fn assemble(
        &self,
        _manifest: &Path,
        _inputs: &[PathBuf],
        _output: &Path,
        _sink: &dyn ProgressSink,
    ) -> Result<(), MergeError> {
        Err(MergeError::AssemblyFailed {
            reason: AssemblyFailure::ExitCode(1),
            diagnostic_tail: self.tail.clone(),
        })
    }
}

/// Fully wired pipeline over scripted collaborators.
pub struct TestHarness {
    pub pipeline: Arc<MergePipeline>,
    pub transport: Arc<ScriptedTransport>,
    pub sink: Arc<RecordingSink>,
    pub history: Arc<SqliteHistory>,
    pub work_root: TempDir,
}

impl TestHarness {
    /// Default harness: byte-concat assembler, default settings and config.
    pub fn new() -> Self {
        Self::build(|_| {}, Arc::new(ConcatAssembler), default_settings())
    }

    /// Harness with a tweaked config.
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        Self::build(tweak, Arc::new(ConcatAssembler), default_settings())
    }

    /// Harness with a custom assembler.
    pub fn with_assembler(assembler: Arc<dyn Assembler>) -> Self {
        Self::build(|_| {}, assembler, default_settings())
    }

    /// Harness with custom settings provider.
    pub fn with_settings(settings: Arc<dyn SettingsProvider>) -> Self {
        Self::build(|_| {}, Arc::new(ConcatAssembler), settings)
    }

    pub fn build(
        tweak: impl FnOnce(&mut Config),
        assembler: Arc<dyn Assembler>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        let work_root = tempfile::tempdir().expect("failed to create temp work dir");

        let mut config = Config::default();
        config.storage.work_dir = work_root.path().to_path_buf();
        tweak(&mut config);

        let transport = Arc::new(ScriptedTransport::new());
        let sink = Arc::new(RecordingSink::default());
        let history =
            Arc::new(SqliteHistory::open_in_memory().expect("failed to open in-memory history"));

        let pipeline = Arc::new(MergePipeline::new(
            &config,
            transport.clone(),
            settings,
            assembler,
            history.clone(),
            sink.clone(),
        ));

        Self {
            pipeline,
            transport,
            sink,
            history,
            work_root,
        }
    }

    /// Number of entries (files or directories) left under the work root.
    pub fn residual_entries(&self) -> usize {
        std::fs::read_dir(self.work_root.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn default_settings() -> Arc<dyn SettingsProvider> {
    Arc::new(StaticSettings::default())
}
