//! HTTP relay transport.
//!
//! Segments are referenced by URL; deliveries are multipart POSTs to
//! channel-specific relay endpoints. Scanning a remote stream is not
//! supported here, so anchor-scan merges need a transport that can.

use super::{
    DeliveryReceipt, MessageTransport, ScanDirection, SegmentLocator, TransferProgress,
    TransportError, UploadMetadata,
};
use crate::config::RelayConfig;
use crate::delivery::Channel;
use futures::StreamExt;
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
struct RelayResponse {
    reference: String,
}

/// Transport over HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    direct_url: String,
    relay_url: String,
}

impl HttpTransport {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            direct_url: config.direct_url.clone(),
            relay_url: config.relay_url.clone(),
        }
    }

    fn endpoint(&self, channel: Channel) -> &str {
        match channel {
            Channel::Direct => &self.direct_url,
            Channel::Relay => &self.relay_url,
        }
    }
}

#[async_trait::async_trait]
impl MessageTransport for HttpTransport {
    async fn scan(
        &self,
        _anchor: &SegmentLocator,
        _direction: ScanDirection,
        _limit: usize,
    ) -> Result<Vec<SegmentLocator>, TransportError> {
        Err(TransportError::ScanUnsupported)
    }

    async fn download(
        &self,
        locator: &SegmentLocator,
        dest: &Path,
        on_progress: TransferProgress<'_>,
    ) -> Result<u64, TransportError> {
        let response = self
            .client
            .get(&locator.id)
            .send()
            .await
            .map_err(|e| TransportError::Transfer(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(locator.id.clone()));
        }
        if !response.status().is_success() {
            return Err(TransportError::Transfer(format!(
                "GET {} returned {}",
                locator.id,
                response.status()
            )));
        }

        let total = response.content_length().or(locator.size_hint);
        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut done = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::Transfer(e.to_string()))?;
            file.write_all(&chunk).await?;
            done += chunk.len() as u64;
            on_progress(done, total);
        }
        file.flush().await?;

        Ok(done)
    }

    async fn upload(
        &self,
        path: &Path,
        channel: Channel,
        metadata: &UploadMetadata,
    ) -> Result<DeliveryReceipt, TransportError> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::stream_with_length(body, len)
                    .file_name(metadata.file_name.clone()),
            )
            .text("caption", metadata.caption.clone());

        if let Some(cover) = &metadata.cover_image {
            let bytes = tokio::fs::read(cover).await?;
            let name = cover
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "cover".to_string());
            form = form.part(
                "cover",
                reqwest::multipart::Part::bytes(bytes).file_name(name),
            );
        }

        let response = self
            .client
            .post(self.endpoint(channel))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Transfer(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Transfer(format!(
                "upload returned {}",
                response.status()
            )));
        }

        let parsed: RelayResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Transfer(format!("bad relay response: {e}")))?;

        Ok(DeliveryReceipt {
            channel,
            reference: parsed.reference,
        })
    }
}
