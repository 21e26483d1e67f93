use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 2 MiB between transfer-progress updates.
fn default_byte_step() -> u64 {
    2 * 1024 * 1024
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub assembly: AssemblyConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root for per-request work directories (segments, manifest, output).
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("/tmp/reelstitch/work")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Explicit ffmpeg path; falls back to PATH lookup.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit ffprobe path; falls back to PATH lookup.
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

/// How assembly chooses between stream copy and re-encode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyMode {
    /// Probe the inputs; copy when compatible, re-encode otherwise.
    #[default]
    Auto,
    /// Always stream copy (fails on incompatible inputs).
    Copy,
    /// Always re-encode to the configured profile.
    Reencode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssemblyConfig {
    #[serde(default)]
    pub mode: AssemblyMode,

    /// Maximum assembly run time before the process is killed.
    #[serde(default = "default_assembly_timeout")]
    pub timeout_secs: u64,

    /// ffmpeg video encoder used in re-encode mode.
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_video_crf")]
    pub video_crf: u32,

    #[serde(default = "default_video_preset")]
    pub video_preset: String,

    /// ffmpeg audio encoder used in re-encode mode.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_assembly_timeout() -> u64 {
    1800
}
fn default_video_codec() -> String {
    "libx264".to_string()
}
fn default_video_crf() -> u32 {
    18
}
fn default_video_preset() -> String {
    "veryfast".to_string()
}
fn default_audio_codec() -> String {
    "aac".to_string()
}
fn default_audio_bitrate() -> String {
    "192k".to_string()
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            mode: AssemblyMode::default(),
            timeout_secs: default_assembly_timeout(),
            video_codec: default_video_codec(),
            video_crf: default_video_crf(),
            video_preset: default_video_preset(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
    /// Primary (direct) channel ceiling in bytes. Default: 2 GiB.
    #[serde(default = "default_direct_ceiling")]
    pub direct_ceiling_bytes: u64,

    /// Secondary (relay) channel ceiling in bytes. Default: 4 GiB.
    #[serde(default = "default_relay_ceiling")]
    pub relay_ceiling_bytes: u64,

    /// Raw-transport ceiling checked by the validator.
    /// Defaults to the relay ceiling when unset.
    #[serde(default)]
    pub max_output_bytes: Option<u64>,

    /// Caption used when the requester has no stored title.
    #[serde(default)]
    pub default_title: Option<String>,

    /// Cover image used when the requester has no stored cover.
    #[serde(default)]
    pub default_cover: Option<PathBuf>,
}

fn default_direct_ceiling() -> u64 {
    2 * 1024 * 1024 * 1024
}
fn default_relay_ceiling() -> u64 {
    4 * 1024 * 1024 * 1024
}

impl DeliveryConfig {
    /// The validator's effective ceiling.
    pub fn effective_max_output(&self) -> u64 {
        self.max_output_bytes.unwrap_or(self.relay_ceiling_bytes)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            direct_ceiling_bytes: default_direct_ceiling(),
            relay_ceiling_bytes: default_relay_ceiling(),
            max_output_bytes: None,
            default_title: None,
            default_cover: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// How long a session may sit in Collecting before it is abandoned.
    #[serde(default = "default_collect_timeout")]
    pub collect_timeout_secs: u64,

    /// How often the sweeper looks for stuck sessions.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_collect_timeout() -> u64 {
    300
}
fn default_sweep_interval() -> u64 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            collect_timeout_secs: default_collect_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
    /// Minimum bytes between transfer updates.
    #[serde(default = "default_byte_step")]
    pub byte_step: u64,

    /// Minimum wall-clock seconds between updates.
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,

    /// Minimum media-time seconds between assembly updates.
    #[serde(default = "default_media_step")]
    pub media_time_step_secs: u64,
}

fn default_min_interval() -> u64 {
    3
}
fn default_media_step() -> u64 {
    2
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            byte_step: default_byte_step(),
            min_interval_secs: default_min_interval(),
            media_time_step_secs: default_media_step(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    /// SQLite database holding the append-only merge history.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelstitch.db")
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Use the HTTP relay transport instead of the local filesystem one.
    #[serde(default)]
    pub enabled: bool,

    /// Upload endpoint for the direct (primary) channel.
    #[serde(default)]
    pub direct_url: String,

    /// Upload endpoint for the relay (secondary) channel.
    #[serde(default)]
    pub relay_url: String,
}
