//! # reelstitch-av
//!
//! External-tool layer for reelstitch: ffmpeg/ffprobe discovery, input
//! probing, concat manifest generation, and monitored assembly runs.
//!
//! The crate knows nothing about sessions, delivery, or history; it takes
//! local file paths and produces local file paths, reporting progress through
//! a callback fed by the child process's diagnostic stream.

pub mod concat;
pub mod error;
pub mod manifest;
pub mod probe;
pub mod progress;
pub mod tools;

pub use concat::{run_concat, ConcatMode, ConcatRequest, EncodeProfile};
pub use error::{Error, Result};
pub use manifest::write_manifest;
pub use probe::{copy_compatible, probe_input, InputProbe};
pub use progress::{parse_time_marker, ProgressEvent, ProgressEvents};
pub use tools::{check_tool, check_tools, get_tool_path, require_tool, ToolInfo};
