//! Trigger-command validation.
//!
//! Malformed triggers are rejected here, before any session entry or file
//! is allocated.

use crate::error::{MergeError, Result};
use crate::transport::ScanDirection;

/// Canonical container extension carried by every output name.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Upper bound on segments per merge; keeps a typo'd count from scanning
/// an entire source stream.
pub const MAX_SEGMENTS: usize = 50;

/// A validated merge trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTrigger {
    pub expected_count: usize,
    pub output_name: String,
    pub direction: ScanDirection,
}

impl MergeTrigger {
    /// Validate the raw trigger fields.
    pub fn new(
        expected_count: usize,
        output_name: &str,
        direction: ScanDirection,
    ) -> Result<Self> {
        if expected_count == 0 {
            return Err(MergeError::usage("expected segment count must be positive"));
        }
        if expected_count > MAX_SEGMENTS {
            return Err(MergeError::usage(format!(
                "expected segment count {expected_count} exceeds the maximum of {MAX_SEGMENTS}"
            )));
        }

        Ok(Self {
            expected_count,
            output_name: normalize_output_name(output_name)?,
            direction,
        })
    }
}

/// Normalize an output name to carry the canonical extension.
///
/// Rejects empty names and names containing path separators; the output
/// name is a file name, never a path.
pub fn normalize_output_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MergeError::usage("output name cannot be empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(MergeError::usage(format!(
            "output name cannot contain path separators: {name}"
        )));
    }

    let lower = name.to_ascii_lowercase();
    if lower.ends_with(&format!(".{OUTPUT_EXTENSION}")) {
        Ok(name.to_string())
    } else {
        Ok(format!("{name}.{OUTPUT_EXTENSION}"))
    }
}
