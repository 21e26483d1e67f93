//! Size-based delivery routing.
//!
//! Two channels, two ceilings: the direct channel is preferred, the relay
//! channel takes what the direct one cannot, and anything over both fails.
//! Presentation metadata is a read-only snapshot from the settings
//! collaborator; this module never writes it back.

use crate::config::DeliveryConfig;
use crate::error::{MergeError, Result};
use crate::ids::RequesterId;
use crate::transport::{DeliveryReceipt, MessageTransport, SettingsProvider, UploadMetadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Primary channel with the lower ceiling.
    Direct,
    /// Secondary relay channel with the higher ceiling.
    Relay,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Relay => write!(f, "relay"),
        }
    }
}

/// A routing decision. Derived from the artifact size, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryDecision {
    pub channel: Channel,
    pub size_ceiling: u64,
}

/// Choose a channel for an artifact of `size` bytes.
pub fn route(size: u64, direct_ceiling: u64, relay_ceiling: u64) -> Result<DeliveryDecision> {
    if size <= direct_ceiling {
        Ok(DeliveryDecision {
            channel: Channel::Direct,
            size_ceiling: direct_ceiling,
        })
    } else if size <= relay_ceiling {
        Ok(DeliveryDecision {
            channel: Channel::Relay,
            size_ceiling: relay_ceiling,
        })
    } else {
        Err(MergeError::OversizeOutput {
            size,
            ceiling: relay_ceiling,
        })
    }
}

/// Routes and dispatches the upload of a finished artifact.
pub struct DeliveryRouter {
    transport: Arc<dyn MessageTransport>,
    settings: Arc<dyn SettingsProvider>,
    direct_ceiling: u64,
    relay_ceiling: u64,
    default_title: Option<String>,
    default_cover: Option<PathBuf>,
}

impl DeliveryRouter {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        settings: Arc<dyn SettingsProvider>,
        config: &DeliveryConfig,
    ) -> Self {
        Self {
            transport,
            settings,
            direct_ceiling: config.direct_ceiling_bytes,
            relay_ceiling: config.relay_ceiling_bytes,
            default_title: config.default_title.clone(),
            default_cover: config.default_cover.clone(),
        }
    }

    /// Route by size and upload, attaching the requester's presentation
    /// snapshot (falling back to configured defaults, then the file name).
    pub async fn deliver(
        &self,
        requester: RequesterId,
        path: &Path,
        output_name: &str,
        size: u64,
    ) -> Result<DeliveryReceipt> {
        let decision = route(size, self.direct_ceiling, self.relay_ceiling)?;

        let presentation = self.settings.get(requester).await;
        let metadata = UploadMetadata {
            caption: presentation
                .display_title
                .or_else(|| self.default_title.clone())
                .unwrap_or_else(|| output_name.to_string()),
            cover_image: presentation
                .cover_image
                .or_else(|| self.default_cover.clone()),
            file_name: output_name.to_string(),
        };

        info!(%requester, channel = %decision.channel, size, "dispatching delivery");

        self.transport
            .upload(path, decision.channel, &metadata)
            .await
            .map_err(MergeError::DeliveryFailed)
    }
}
