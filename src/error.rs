//! Error taxonomy for the merge pipeline.

use crate::ids::RequesterId;
use crate::transport::TransportError;

/// Result type alias using [`MergeError`].
pub type Result<T> = std::result::Result<T, MergeError>;

/// Why a segment submission was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowKind {
    /// No session is collecting for this requester.
    NotCollecting,
    /// The session already holds the expected number of segments.
    AlreadyComplete,
}

impl std::fmt::Display for OverflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCollecting => write!(f, "no merge is collecting segments"),
            Self::AlreadyComplete => write!(f, "all expected segments were already received"),
        }
    }
}

/// Why assembly failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyFailure {
    /// The external process exited with a non-zero code.
    ExitCode(i32),
    /// The external process was killed (signal or timeout).
    Terminated,
    /// The process reported success but left no output artifact.
    MissingOutput,
    /// The tool layer failed before or while running the process.
    Tool(String),
}

impl std::fmt::Display for AssemblyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExitCode(code) => write!(f, "exit code {code}"),
            Self::Terminated => write!(f, "process terminated"),
            Self::MissingOutput => write!(f, "missing output artifact"),
            Self::Tool(msg) => write!(f, "{msg}"),
        }
    }
}

/// Errors surfaced by the merge pipeline.
///
/// Every variant except cleanup warnings (which are logged, never returned)
/// is terminal for its request: the session transitions to Failed and all
/// tracked paths are released.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Malformed trigger, rejected before any resource is allocated.
    #[error("usage: {0}")]
    Usage(String),

    /// The requester already has an active merge.
    #[error("a merge is already in progress for requester {0}")]
    AlreadyInProgress(RequesterId),

    /// A segment was submitted outside the Collecting window.
    #[error("segment rejected: {0}")]
    SegmentOverflow(OverflowKind),

    /// Anchor-scan found fewer qualifying segments than expected.
    #[error("found only {found} of {expected} segments")]
    InsufficientSegments { found: usize, expected: usize },

    /// A single segment download failed; the whole acquisition fails with it.
    #[error("download of segment {index} failed: {cause}")]
    DownloadFailed {
        index: usize,
        #[source]
        cause: TransportError,
    },

    /// The concat manifest could not be written.
    #[error("manifest write failed: {0}")]
    ManifestWrite(String),

    /// The external assembly process failed.
    #[error("assembly failed: {reason}\n{diagnostic_tail}")]
    AssemblyFailed {
        reason: AssemblyFailure,
        diagnostic_tail: String,
    },

    /// The artifact exceeds every configured ceiling.
    #[error("output is {size} bytes, over the {ceiling} byte ceiling")]
    OversizeOutput { size: u64, ceiling: u64 },

    /// The upload to the selected channel failed.
    #[error("delivery failed: {0}")]
    DeliveryFailed(#[source] TransportError),

    /// The history store rejected an operation.
    #[error("history store error: {0}")]
    History(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MergeError {
    /// Create a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}
