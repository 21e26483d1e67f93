//! Per-requester merge session tracking.
//!
//! One entry per requester, exclusively owned by its active request.
//! Sessions for different requesters are independent; the DashMap only
//! serializes access to the table itself.

use crate::cleanup::CleanupTracker;
use crate::error::{MergeError, OverflowKind, Result};
use crate::ids::{RequestId, RequesterId};
use crate::transport::{ScanDirection, SegmentLocator};
use crate::trigger::MergeTrigger;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// How a session's segment list gets resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Walk the source stream from an anchor segment.
    Scan { direction: ScanDirection },
    /// Segments arrive as discrete uploads.
    Collect,
}

/// State of an active merge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Collecting { expected: usize, received: usize },
    Ready,
    Assembling,
    Validating,
    Delivering,
}

/// One in-progress merge request. Owned by the session table until a
/// terminal transition purges it.
#[derive(Debug)]
pub struct MergeRequest {
    pub id: RequestId,
    pub requester: RequesterId,
    pub output_name: String,
    pub expected: usize,
    pub mode: AcquireMode,
    pub locators: Vec<SegmentLocator>,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub collect_deadline: DateTime<Utc>,
    pub cleanup: Arc<CleanupTracker>,
}

/// Result of submitting one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectProgress {
    /// Still collecting; carries the new counts.
    Collecting { received: usize, expected: usize },
    /// The expected count was reached; the session is Ready.
    Ready,
}

/// Everything the pipeline needs to run one Ready request.
///
/// Cloned out of the table when the pipeline claims the request; the table
/// entry stays behind as the occupancy marker until the terminal transition.
#[derive(Debug, Clone)]
pub struct ReadyRequest {
    pub id: RequestId,
    pub requester: RequesterId,
    pub output_name: String,
    pub expected: usize,
    pub mode: AcquireMode,
    pub locators: Vec<SegmentLocator>,
    pub cleanup: Arc<CleanupTracker>,
}

/// Requester-keyed table of active merge sessions.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<RequesterId, MergeRequest>>,
    collect_timeout: ChronoDuration,
}

impl SessionStore {
    pub fn new(collect_timeout_secs: u64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            collect_timeout: ChronoDuration::seconds(collect_timeout_secs as i64),
        }
    }

    /// Begin an accumulation-mode session: segments arrive one by one.
    pub fn begin_collect(&self, requester: RequesterId, trigger: &MergeTrigger) -> Result<RequestId> {
        self.insert(
            requester,
            trigger,
            AcquireMode::Collect,
            Vec::new(),
            SessionState::Collecting {
                expected: trigger.expected_count,
                received: 0,
            },
        )
    }

    /// Begin an anchor-scan session: the segment list resolves during
    /// acquisition, so the session is Ready immediately.
    pub fn begin_scan(
        &self,
        requester: RequesterId,
        trigger: &MergeTrigger,
        anchor: SegmentLocator,
    ) -> Result<RequestId> {
        self.insert(
            requester,
            trigger,
            AcquireMode::Scan {
                direction: trigger.direction,
            },
            vec![anchor],
            SessionState::Ready,
        )
    }

    fn insert(
        &self,
        requester: RequesterId,
        trigger: &MergeTrigger,
        mode: AcquireMode,
        locators: Vec<SegmentLocator>,
        state: SessionState,
    ) -> Result<RequestId> {
        match self.sessions.entry(requester) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(MergeError::AlreadyInProgress(requester))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let id = RequestId::new();
                let now = Utc::now();
                vacant.insert(MergeRequest {
                    id,
                    requester,
                    output_name: trigger.output_name.clone(),
                    expected: trigger.expected_count,
                    mode,
                    locators,
                    state,
                    started_at: now,
                    collect_deadline: now + self.collect_timeout,
                    cleanup: Arc::new(CleanupTracker::new()),
                });
                info!(%requester, request_id = %id, expected = trigger.expected_count, "merge session started");
                Ok(id)
            }
        }
    }

    /// Submit one segment to a Collecting session.
    pub fn add_segment(
        &self,
        requester: RequesterId,
        locator: SegmentLocator,
    ) -> Result<CollectProgress> {
        let mut entry = self
            .sessions
            .get_mut(&requester)
            .ok_or(MergeError::SegmentOverflow(OverflowKind::NotCollecting))?;

        let (expected, received) = match entry.state {
            SessionState::Collecting { expected, received } => (expected, received),
            // Ready and later states already hold their full complement.
            _ => return Err(MergeError::SegmentOverflow(OverflowKind::AlreadyComplete)),
        };
        debug_assert!(received < expected);

        entry.locators.push(locator);
        let received = received + 1;

        if received == expected {
            entry.state = SessionState::Ready;
            Ok(CollectProgress::Ready)
        } else {
            entry.state = SessionState::Collecting { expected, received };
            Ok(CollectProgress::Collecting { received, expected })
        }
    }

    /// Claim a Ready session for execution, moving it to Assembling.
    pub fn claim_ready(&self, requester: RequesterId) -> Option<ReadyRequest> {
        let mut entry = self.sessions.get_mut(&requester)?;
        if entry.state != SessionState::Ready {
            return None;
        }
        entry.state = SessionState::Assembling;

        Some(ReadyRequest {
            id: entry.id,
            requester: entry.requester,
            output_name: entry.output_name.clone(),
            expected: entry.expected,
            mode: entry.mode,
            locators: entry.locators.clone(),
            cleanup: Arc::clone(&entry.cleanup),
        })
    }

    /// Record a stage transition for an executing session.
    pub fn set_state(&self, requester: RequesterId, state: SessionState) {
        if let Some(mut entry) = self.sessions.get_mut(&requester) {
            entry.state = state;
        }
    }

    /// Current state of a requester's session, if any.
    pub fn state(&self, requester: RequesterId) -> Option<SessionState> {
        self.sessions.get(&requester).map(|e| e.state)
    }

    /// Purge a session on its terminal transition.
    pub fn finish(&self, requester: RequesterId) {
        if let Some((_, request)) = self.sessions.remove(&requester) {
            info!(
                %requester,
                request_id = %request.id,
                elapsed_secs = (Utc::now() - request.started_at).num_seconds(),
                "merge session closed"
            );
        }
    }

    /// Requesters whose sessions sat in Collecting past their deadline.
    pub fn expired_collecting(&self) -> Vec<RequesterId> {
        let now = Utc::now();
        self.sessions
            .iter()
            .filter(|entry| {
                matches!(entry.state, SessionState::Collecting { .. })
                    && now > entry.collect_deadline
            })
            .map(|entry| *entry.key())
            .collect()
    }

    /// Remove a session only if it is still Collecting (abandonment can race
    /// with the final segment arriving).
    pub fn remove_if_collecting(&self, requester: RequesterId) -> Option<MergeRequest> {
        self.sessions
            .remove_if(&requester, |_, request| {
                matches!(request.state, SessionState::Collecting { .. })
            })
            .map(|(_, request)| request)
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether any session is active.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
