//! Per-request merge pipeline driver.
//!
//! Stages run strictly sequentially within one request: acquire → manifest →
//! assemble → validate → deliver → record. Every suspension point is an
//! await, so other requesters' pipelines advance while one waits on I/O or
//! the external process. Any failure transitions the request to Failed and
//! the cleanup tracker drains on every exit path.

use crate::acquire::SegmentAcquirer;
use crate::assembly::Assembler;
use crate::config::Config;
use crate::delivery::DeliveryRouter;
use crate::error::{MergeError, Result};
use crate::history::{HistoryEntry, HistoryStore};
use crate::ids::RequesterId;
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::session::{
    AcquireMode, CollectProgress, ReadyRequest, SessionState, SessionStore,
};
use crate::transport::{DeliveryReceipt, MessageTransport, SegmentLocator, SettingsProvider};
use crate::trigger::MergeTrigger;
use crate::validate::validate_output;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Orchestrates merge requests end to end.
pub struct MergePipeline {
    sessions: SessionStore,
    acquirer: SegmentAcquirer,
    assembler: Arc<dyn Assembler>,
    router: DeliveryRouter,
    history: Arc<dyn HistoryStore>,
    sink: Arc<dyn ProgressSink>,
    work_root: PathBuf,
    max_output_bytes: u64,
}

impl MergePipeline {
    pub fn new(
        config: &Config,
        transport: Arc<dyn MessageTransport>,
        settings: Arc<dyn SettingsProvider>,
        assembler: Arc<dyn Assembler>,
        history: Arc<dyn HistoryStore>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(config.session.collect_timeout_secs),
            acquirer: SegmentAcquirer::new(Arc::clone(&transport), Arc::clone(&sink)),
            assembler,
            router: DeliveryRouter::new(transport, settings, &config.delivery),
            history,
            sink,
            work_root: config.storage.work_dir.clone(),
            max_output_bytes: config.delivery.effective_max_output(),
        }
    }

    /// The session table, for front-ends that need to inspect it.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Begin an accumulation-mode merge. Segments follow via
    /// [`add_segment`](Self::add_segment).
    pub fn begin_collect(&self, requester: RequesterId, trigger: &MergeTrigger) -> Result<()> {
        self.sessions.begin_collect(requester, trigger)?;
        self.sink.update(ProgressUpdate::Status(format!(
            "Collecting 0/{}",
            trigger.expected_count
        )));
        Ok(())
    }

    /// Submit one segment to a collecting session. Returns `Ready` when the
    /// expected count is reached; the front-end then calls
    /// [`run_ready`](Self::run_ready) (typically on a spawned task).
    pub fn add_segment(
        &self,
        requester: RequesterId,
        locator: SegmentLocator,
    ) -> Result<CollectProgress> {
        let progress = self.sessions.add_segment(requester, locator)?;
        if let CollectProgress::Collecting { received, expected } = progress {
            self.sink.update(ProgressUpdate::Status(format!(
                "Collecting {received}/{expected}"
            )));
        }
        Ok(progress)
    }

    /// Begin an anchor-scan merge and run it to its terminal state.
    pub async fn run_scan(
        &self,
        requester: RequesterId,
        trigger: &MergeTrigger,
        anchor: SegmentLocator,
    ) -> Result<DeliveryReceipt> {
        self.sessions.begin_scan(requester, trigger, anchor)?;
        self.run_ready(requester).await
    }

    /// Drive a Ready session through the staged pipeline to its terminal
    /// state. Cleanup runs and the session is purged on every exit path.
    pub async fn run_ready(&self, requester: RequesterId) -> Result<DeliveryReceipt> {
        let request = self
            .sessions
            .claim_ready(requester)
            .ok_or_else(|| MergeError::usage("no merge is ready to run"))?;

        let result = self.execute(&request).await;

        match &result {
            Ok(receipt) => {
                info!(
                    %requester,
                    request_id = %request.id,
                    channel = %receipt.channel,
                    "merge completed"
                );
                self.sink.update(ProgressUpdate::Done);
            }
            Err(e) => {
                error!(%requester, request_id = %request.id, error = %e, "merge failed");
                self.sink
                    .update(ProgressUpdate::Status(format!("Failed: {e}")));
            }
        }

        request.cleanup.run();
        self.sessions.finish(requester);

        result
    }

    /// Abandon every session stuck in Collecting past its deadline, routing
    /// each through the same terminal-Failed path as any other failure.
    pub fn abandon_expired(&self) -> Vec<RequesterId> {
        let mut abandoned = Vec::new();
        for requester in self.sessions.expired_collecting() {
            if let Some(request) = self.sessions.remove_if_collecting(requester) {
                warn!(%requester, request_id = %request.id, "abandoning stalled merge");
                self.sink.update(ProgressUpdate::Status(
                    "Failed: timed out waiting for segments".to_string(),
                ));
                request.cleanup.run();
                abandoned.push(requester);
            }
        }
        abandoned
    }

    /// Spawn the background sweeper that abandons stalled sessions.
    pub fn spawn_sweeper(self: &Arc<Self>, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                pipeline.abandon_expired();
            }
        })
    }

    async fn execute(&self, request: &ReadyRequest) -> Result<DeliveryReceipt> {
        let work_dir = self.work_root.join(request.id.to_string());
        std::fs::create_dir_all(&work_dir)?;
        request.cleanup.set_work_dir(&work_dir);

        // Acquire.
        let segments = match request.mode {
            AcquireMode::Scan { direction } => {
                let anchor = request
                    .locators
                    .first()
                    .ok_or_else(|| MergeError::usage("scan merge has no anchor segment"))?;
                self.acquirer
                    .acquire_by_scan(
                        anchor,
                        direction,
                        request.expected,
                        &work_dir,
                        &request.cleanup,
                    )
                    .await?
            }
            AcquireMode::Collect => {
                self.acquirer
                    .acquire_collected(&request.locators, &work_dir, &request.cleanup)
                    .await?
            }
        };
        debug_assert_eq!(segments.len(), request.expected);

        // Manifest.
        let inputs: Vec<PathBuf> = segments.iter().map(|s| s.local_path.clone()).collect();
        let manifest_path = work_dir.join("segments.ffconcat");
        request.cleanup.track(&manifest_path);
        reelstitch_av::write_manifest(&inputs, &manifest_path)
            .map_err(|e| MergeError::ManifestWrite(e.to_string()))?;

        // Assemble.
        self.sessions
            .set_state(request.requester, SessionState::Assembling);
        self.sink
            .update(ProgressUpdate::Status("Assembling".to_string()));
        let output_path = work_dir.join(&request.output_name);
        request.cleanup.track(&output_path);
        self.assembler
            .assemble(&manifest_path, &inputs, &output_path, self.sink.as_ref())
            .await?;

        // Validate.
        self.sessions
            .set_state(request.requester, SessionState::Validating);
        let size = validate_output(&output_path, self.max_output_bytes)?;

        // Deliver.
        self.sessions
            .set_state(request.requester, SessionState::Delivering);
        self.sink
            .update(ProgressUpdate::Status("Uploading".to_string()));
        let receipt = self
            .router
            .deliver(request.requester, &output_path, &request.output_name, size)
            .await?;

        // Record. Delivery already succeeded, so a history failure is logged
        // rather than failing the request.
        let entry = HistoryEntry {
            requester: request.requester,
            output_name: request.output_name.clone(),
            size_bytes: size,
            segment_count: segments.len(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.history.append(&entry).await {
            warn!(requester = %request.requester, error = %e, "failed to record merge history");
        }

        Ok(receipt)
    }
}
