//! FFprobe-based probing of concat inputs.
//!
//! Assembly only needs enough stream metadata to decide whether the concat
//! demuxer can stream-copy the inputs or whether a re-encode is required, so
//! this probe is deliberately narrower than a full media inspector.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Stream parameters of one concat input, as reported by ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct InputProbe {
    pub path: PathBuf,
    pub container: String,
    pub duration: Option<Duration>,
    pub video_codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub audio_codec: Option<String>,
}

/// Probe one input file with ffprobe.
pub async fn probe_input(ffprobe: &Path, path: &Path) -> Result<InputProbe> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffprobe")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed("ffprobe", stderr.trim().to_string()));
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

    let duration = parsed
        .format
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|s| *s >= 0.0)
        .map(Duration::from_secs_f64);

    let video = parsed.streams.iter().find(|s| s.codec_type == "video");
    let audio = parsed.streams.iter().find(|s| s.codec_type == "audio");

    Ok(InputProbe {
        path: path.to_path_buf(),
        container: parsed.format.format_name,
        duration,
        video_codec: video.and_then(|s| s.codec_name.clone()),
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        audio_codec: audio.and_then(|s| s.codec_name.clone()),
    })
}

/// Decide whether a set of inputs can be concatenated with pure stream copy.
///
/// The concat demuxer produces a playable artifact under `-c copy` only when
/// every input carries the same video codec, the same dimensions, and the
/// same audio codec. Anything else needs a re-encode.
pub fn copy_compatible(probes: &[InputProbe]) -> bool {
    let Some(first) = probes.first() else {
        return false;
    };

    probes.iter().all(|p| {
        p.video_codec == first.video_codec
            && p.width == first.width
            && p.height == first.height
            && p.audio_codec == first.audio_codec
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(codec: &str, w: u32, h: u32, audio: &str) -> InputProbe {
        InputProbe {
            path: PathBuf::from("/x.mp4"),
            container: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            duration: Some(Duration::from_secs(60)),
            video_codec: Some(codec.to_string()),
            width: Some(w),
            height: Some(h),
            audio_codec: Some(audio.to_string()),
        }
    }

    #[test]
    fn matching_inputs_are_copy_compatible() {
        let probes = vec![
            probe("h264", 1920, 1080, "aac"),
            probe("h264", 1920, 1080, "aac"),
            probe("h264", 1920, 1080, "aac"),
        ];
        assert!(copy_compatible(&probes));
    }

    #[test]
    fn codec_mismatch_forces_reencode() {
        let probes = vec![probe("h264", 1920, 1080, "aac"), probe("hevc", 1920, 1080, "aac")];
        assert!(!copy_compatible(&probes));
    }

    #[test]
    fn dimension_mismatch_forces_reencode() {
        let probes = vec![probe("h264", 1920, 1080, "aac"), probe("h264", 1280, 720, "aac")];
        assert!(!copy_compatible(&probes));
    }

    #[test]
    fn empty_input_set_is_not_compatible() {
        assert!(!copy_compatible(&[]));
    }

    #[test]
    fn parse_ffprobe_json() {
        let json = r#"{
            "format": { "format_name": "matroska,webm", "duration": "12.500000" },
            "streams": [
                { "codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720 },
                { "codec_type": "audio", "codec_name": "aac" }
            ]
        }"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.format.format_name, "matroska,webm");
        assert_eq!(parsed.streams.len(), 2);
        assert_eq!(parsed.streams[0].width, Some(1280));
    }
}
