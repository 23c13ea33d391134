//! Atomic file replacement.
//!
//! Contents go to a temporary file in the destination's directory, are
//! flushed to disk, and are then renamed over the destination. Readers see
//! either the old file or the new one, never a partial write.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces `path` with `contents` atomically.
///
/// # Errors
/// Returns an IO error if the temporary file cannot be written or renamed.
/// On error the destination is untouched and the temporary file is removed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
