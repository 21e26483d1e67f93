//! Output artifact validation.

use crate::error::{MergeError, Result};
use std::path::Path;
use tracing::debug;

/// Confirm the artifact exists and fits under the raw-transport ceiling.
///
/// Returns the artifact size. On [`MergeError::OversizeOutput`] the artifact
/// is left in place; deleting it is the cleanup coordinator's job.
pub fn validate_output(path: &Path, ceiling: u64) -> Result<u64> {
    let metadata = std::fs::metadata(path)?;
    let size = metadata.len();

    debug!(path = %path.display(), size, ceiling, "validating output artifact");

    if size > ceiling {
        return Err(MergeError::OversizeOutput { size, ceiling });
    }

    Ok(size)
}
