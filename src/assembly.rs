//! Assembly engine.
//!
//! The [`Assembler`] seam decouples the pipeline from ffmpeg; the shipped
//! implementation probes the inputs, decides between stream copy and
//! re-encode, and runs a monitored concat through reelstitch-av.

use crate::config::{AssemblyConfig, AssemblyMode, ToolsConfig};
use crate::error::{AssemblyFailure, MergeError, Result};
use crate::progress::{ProgressSink, ProgressUpdate};
use reelstitch_av::{ConcatMode, ConcatRequest, EncodeProfile};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Turns a manifest of ordered segments into one output artifact.
#[async_trait::async_trait]
pub trait Assembler: Send + Sync {
    /// Assemble `inputs` (already listed in `manifest`, in order) into
    /// `output`, reporting progress to `sink`.
    async fn assemble(
        &self,
        manifest: &Path,
        inputs: &[PathBuf],
        output: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<()>;
}

/// ffmpeg-backed assembler.
pub struct FfmpegAssembler {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    mode: AssemblyMode,
    profile: EncodeProfile,
    timeout: Duration,
}

impl FfmpegAssembler {
    /// Resolve tool paths and build the assembler. Fails up front when
    /// ffmpeg or ffprobe cannot be found; a merge should never get past
    /// acquisition only to discover the tools are missing.
    pub fn from_config(tools: &ToolsConfig, assembly: &AssemblyConfig) -> Result<Self> {
        let ffmpeg = reelstitch_av::get_tool_path("ffmpeg", tools.ffmpeg_path.as_deref())
            .map_err(|e| tool_error(e.to_string()))?;
        let ffprobe = reelstitch_av::get_tool_path("ffprobe", tools.ffprobe_path.as_deref())
            .map_err(|e| tool_error(e.to_string()))?;

        Ok(Self {
            ffmpeg,
            ffprobe,
            mode: assembly.mode,
            profile: EncodeProfile {
                video_codec: assembly.video_codec.clone(),
                video_crf: assembly.video_crf,
                video_preset: assembly.video_preset.clone(),
                audio_codec: assembly.audio_codec.clone(),
                audio_bitrate: assembly.audio_bitrate.clone(),
            },
            timeout: Duration::from_secs(assembly.timeout_secs),
        })
    }

    async fn resolve_mode(&self, inputs: &[PathBuf]) -> Result<ConcatMode> {
        match self.mode {
            AssemblyMode::Copy => Ok(ConcatMode::Copy),
            AssemblyMode::Reencode => Ok(ConcatMode::Reencode),
            AssemblyMode::Auto => {
                let mut probes = Vec::with_capacity(inputs.len());
                for input in inputs {
                    let probe = reelstitch_av::probe_input(&self.ffprobe, input)
                        .await
                        .map_err(|e| tool_error(e.to_string()))?;
                    debug!(
                        input = %input.display(),
                        video = ?probe.video_codec,
                        audio = ?probe.audio_codec,
                        "probed concat input"
                    );
                    probes.push(probe);
                }

                if reelstitch_av::copy_compatible(&probes) {
                    Ok(ConcatMode::Copy)
                } else {
                    Ok(ConcatMode::Reencode)
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Assembler for FfmpegAssembler {
    async fn assemble(
        &self,
        manifest: &Path,
        inputs: &[PathBuf],
        output: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<()> {
        let mode = self.resolve_mode(inputs).await?;
        info!(?mode, inputs = inputs.len(), "starting assembly");

        reelstitch_av::run_concat(
            ConcatRequest {
                ffmpeg: &self.ffmpeg,
                manifest,
                output,
                mode,
                profile: &self.profile,
                timeout: self.timeout,
            },
            |event| {
                sink.update(ProgressUpdate::MediaTime {
                    elapsed: event.media_time,
                });
            },
        )
        .await
        .map_err(map_av_error)
    }
}

fn tool_error(message: String) -> MergeError {
    MergeError::AssemblyFailed {
        reason: AssemblyFailure::Tool(message),
        diagnostic_tail: String::new(),
    }
}

fn map_av_error(error: reelstitch_av::Error) -> MergeError {
    use reelstitch_av::Error as Av;
    match error {
        Av::ConcatFailed {
            code: Some(code),
            tail,
        } => MergeError::AssemblyFailed {
            reason: AssemblyFailure::ExitCode(code),
            diagnostic_tail: tail,
        },
        Av::ConcatFailed { code: None, tail } => MergeError::AssemblyFailed {
            reason: AssemblyFailure::Terminated,
            diagnostic_tail: tail,
        },
        Av::MissingOutput { tail, .. } => MergeError::AssemblyFailed {
            reason: AssemblyFailure::MissingOutput,
            diagnostic_tail: tail,
        },
        other => tool_error(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn nonzero_exit_maps_to_exit_code() {
        let err = map_av_error(reelstitch_av::Error::ConcatFailed {
            code: Some(1),
            tail: "moov atom not found".to_string(),
        });
        assert_matches!(
            err,
            MergeError::AssemblyFailed {
                reason: AssemblyFailure::ExitCode(1),
                ref diagnostic_tail,
            } if diagnostic_tail.contains("moov atom")
        );
    }

    #[test]
    fn missing_output_keeps_its_tail() {
        let err = map_av_error(reelstitch_av::Error::MissingOutput {
            path: PathBuf::from("/tmp/out.mp4"),
            tail: "nothing was written".to_string(),
        });
        assert_matches!(
            err,
            MergeError::AssemblyFailed {
                reason: AssemblyFailure::MissingOutput,
                ref diagnostic_tail,
            } if diagnostic_tail == "nothing was written"
        );
    }

    #[test]
    fn missing_tools_fail_construction() {
        let tools = ToolsConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
            ffprobe_path: None,
        };
        // PATH lookup may legitimately find ffmpeg on a dev machine; only
        // assert when it does not.
        if reelstitch_av::require_tool("ffmpeg").is_err() {
            let result = FfmpegAssembler::from_config(&tools, &AssemblyConfig::default());
            assert!(result.is_err());
        }
    }
}
