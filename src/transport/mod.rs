//! Collaborator seams toward the messaging front-end.
//!
//! The pipeline never talks to a wire protocol directly; it consumes these
//! traits. The repo ships a filesystem transport (CLI, tests) and an HTTP
//! relay transport, but any front-end implementing [`MessageTransport`] and
//! [`SettingsProvider`] plugs in unchanged.

pub mod http;
pub mod local;

pub use http::HttpTransport;
pub use local::LocalTransport;

use crate::delivery::Channel;
use crate::ids::RequesterId;
use std::path::{Path, PathBuf};

/// Errors surfaced by transports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The referenced segment does not exist at the source.
    #[error("segment not found: {0}")]
    NotFound(String),

    /// A transfer failed mid-flight.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// This transport cannot enumerate the source stream.
    #[error("scanning is not supported by this transport")]
    ScanUnsupported,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reference to one segment at its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLocator {
    /// Source identity; also the deduplication key.
    pub id: String,
    /// Chronological position within the source stream.
    pub sequence: i64,
    /// File name the segment carries at the source.
    pub file_name: String,
    /// Size in bytes, when the source knows it up front.
    pub size_hint: Option<u64>,
}

/// Which way an anchor-scan walks the source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    #[default]
    Forward,
    Backward,
}

/// Presentation metadata attached to an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    /// Caption shown with the delivered artifact.
    pub caption: String,
    /// Optional cover image.
    pub cover_image: Option<PathBuf>,
    /// File name the artifact is delivered under.
    pub file_name: String,
}

/// Proof of a completed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Channel the artifact went out on.
    pub channel: Channel,
    /// Transport-specific reference (message id, URL, path).
    pub reference: String,
}

/// Progress callback for transfers: (bytes done, total if known).
pub type TransferProgress<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Transport toward the messaging front-end.
#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync {
    /// Enumerate up to `limit` candidate segments starting at `anchor`,
    /// walking `direction` through the source stream. The anchor itself is
    /// included. Candidates are returned in walk order.
    async fn scan(
        &self,
        anchor: &SegmentLocator,
        direction: ScanDirection,
        limit: usize,
    ) -> Result<Vec<SegmentLocator>, TransportError>;

    /// Stream one segment to `dest`, reporting progress. Returns bytes written.
    async fn download(
        &self,
        locator: &SegmentLocator,
        dest: &Path,
        on_progress: TransferProgress<'_>,
    ) -> Result<u64, TransportError>;

    /// Upload an artifact on the given channel.
    async fn upload(
        &self,
        path: &Path,
        channel: Channel,
        metadata: &UploadMetadata,
    ) -> Result<DeliveryReceipt, TransportError>;
}

/// Per-requester presentation settings, read as a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presentation {
    pub display_title: Option<String>,
    pub cover_image: Option<PathBuf>,
}

/// Read-only view of the external settings collaborator.
///
/// Infallible at the seam: implementations resolve their own failures to an
/// empty snapshot so presentation can never fail a merge.
#[async_trait::async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn get(&self, requester: RequesterId) -> Presentation;
}

/// Settings provider returning the same snapshot for every requester.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    pub presentation: Presentation,
}

#[async_trait::async_trait]
impl SettingsProvider for StaticSettings {
    async fn get(&self, _requester: RequesterId) -> Presentation {
        self.presentation.clone()
    }
}
