//! Monitored ffmpeg concat runs.
//!
//! Builds the concat-demuxer invocation (stream copy or re-encode), spawns
//! the process, consumes its diagnostic stream as progress events, and turns
//! every failure mode into an error that carries the diagnostic tail.

use crate::progress::{ProgressEvent, ProgressEvents, DEFAULT_TAIL_LINES};
use crate::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// How the inputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatMode {
    /// Stream copy; requires compatible input streams.
    Copy,
    /// Re-encode every stream to the target profile.
    Reencode,
}

/// Target profile for re-encode runs.
#[derive(Debug, Clone)]
pub struct EncodeProfile {
    /// ffmpeg video encoder name (default: libx264).
    pub video_codec: String,
    /// Constant rate factor (default: 18).
    pub video_crf: u32,
    /// Encoder preset (default: veryfast).
    pub video_preset: String,
    /// ffmpeg audio encoder name (default: aac).
    pub audio_codec: String,
    /// Audio bitrate (default: 192k).
    pub audio_bitrate: String,
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            video_crf: 18,
            video_preset: "veryfast".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

/// One concat invocation.
#[derive(Debug)]
pub struct ConcatRequest<'a> {
    /// Path to the ffmpeg binary.
    pub ffmpeg: &'a Path,
    /// Path to the ffconcat manifest.
    pub manifest: &'a Path,
    /// Output artifact path.
    pub output: &'a Path,
    /// Copy or re-encode.
    pub mode: ConcatMode,
    /// Profile applied in re-encode mode.
    pub profile: &'a EncodeProfile,
    /// Maximum run time before the process is killed.
    pub timeout: Duration,
}

/// Run a concat job, forwarding each progress event to `on_progress`.
///
/// # Errors
///
/// - [`Error::ToolFailed`] if the process cannot be spawned or times out.
/// - [`Error::ConcatFailed`] on non-zero exit, carrying the diagnostic tail.
/// - [`Error::MissingOutput`] if the process succeeds but no artifact exists.
pub async fn run_concat(
    req: ConcatRequest<'_>,
    mut on_progress: impl FnMut(ProgressEvent),
) -> Result<()> {
    let mut cmd = Command::new(req.ffmpeg);
    cmd.arg("-hide_banner")
        .arg("-y")
        .args(["-f", "concat", "-safe", "0"])
        .arg("-i")
        .arg(req.manifest);

    match req.mode {
        ConcatMode::Copy => {
            cmd.args(["-c", "copy"]);
        }
        ConcatMode::Reencode => {
            cmd.args(["-c:v", &req.profile.video_codec])
                .args(["-crf", &req.profile.video_crf.to_string()])
                .args(["-preset", &req.profile.video_preset])
                .args(["-c:a", &req.profile.audio_codec])
                .args(["-b:a", &req.profile.audio_bitrate]);
        }
    }

    cmd.arg(req.output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    debug!(mode = ?req.mode, manifest = %req.manifest.display(), "spawning ffmpeg concat");

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::tool_failed("ffmpeg", format!("failed to spawn: {e}")))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::tool_failed("ffmpeg", "stderr was not captured"))?;
    let mut events = ProgressEvents::new(stderr, DEFAULT_TAIL_LINES);

    let deadline = tokio::time::sleep(req.timeout);
    tokio::pin!(deadline);

    // Drain the diagnostic stream to completion, then reap the child. The
    // stream must be consumed before wait() or a chatty run can fill the
    // pipe and deadlock the process.
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => on_progress(event),
                None => break,
            },
            _ = &mut deadline => {
                let _ = child.kill().await;
                return Err(Error::tool_failed(
                    "ffmpeg",
                    format!("timed out after {:?}: {}", req.timeout, events.tail()),
                ));
            }
        }
    }

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = &mut deadline => {
            let _ = child.kill().await;
            return Err(Error::tool_failed(
                "ffmpeg",
                format!("timed out after {:?}: {}", req.timeout, events.tail()),
            ));
        }
    };

    if !status.success() {
        return Err(Error::ConcatFailed {
            code: status.code(),
            tail: events.tail(),
        });
    }

    let produced = req
        .output
        .metadata()
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false);
    if !produced {
        return Err(Error::MissingOutput {
            path: req.output.to_path_buf(),
            tail: events.tail(),
        });
    }

    Ok(())
}
