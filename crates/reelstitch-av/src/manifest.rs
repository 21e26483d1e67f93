//! Concat manifest writer (ffconcat version 1.0).
//!
//! The manifest lists segment paths in assembly order for ffmpeg's concat
//! demuxer. Every path is re-checked for existence immediately before the
//! manifest is written; a segment deleted by a racing cancellation must fail
//! here rather than surface as an opaque ffmpeg error.

use crate::{Error, Result};
use std::fmt::Write as _;
use std::path::Path;

/// Write the ordered segment paths to `dest` in ffconcat v1 format.
///
/// # Errors
///
/// Returns [`Error::Manifest`] if any input path no longer exists, and
/// [`Error::Io`] if the manifest file cannot be written.
pub fn write_manifest<P: AsRef<Path>>(inputs: &[P], dest: &Path) -> Result<()> {
    let mut body = String::from("ffconcat version 1.0\n");

    for input in inputs {
        let input = input.as_ref();
        if !input.is_file() {
            return Err(Error::Manifest(format!(
                "input missing: {}",
                input.display()
            )));
        }

        let _ = writeln!(body, "file '{}'", escape_path(input));
    }

    std::fs::write(dest, body)?;
    Ok(())
}

/// Escape a path for a single-quoted ffconcat `file` directive.
///
/// The concat demuxer uses shell-style quoting: a literal single quote ends
/// the quoted span, emits an escaped quote, and reopens it.
fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}
