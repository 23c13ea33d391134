//! Pre-mutation backups of the project file.
//!
//! Backups are taken by the calling layer before a transaction begins; the
//! transaction itself never copies files.

use crate::core::error::{PbxError, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sibling path a backup of `path` is written to.
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    let file_name = path
        .file_name()
        .map_or_else(|| "project".to_string(), |n| n.to_string_lossy().to_string());
    path.with_file_name(format!("{file_name}.{stamp}.bak"))
}

/// Copies the project file to a timestamped sibling.
///
/// # Errors
/// Returns a `backup_failed` codec error if the copy fails.
pub fn create_backup(path: &Path) -> Result<PathBuf> {
    let target = backup_path(path);
    std::fs::copy(path, &target).map_err(|e| {
        PbxError::codec("backup_failed", e.to_string(), "storage:backup")
            .with_context("path", path.display().to_string())
    })?;
    info!(backup = %target.display(), "backed up project file");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_copies_contents_next_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Demo.pbxproj.json");
        std::fs::write(&path, "{}").unwrap();

        let backup = create_backup(&path).unwrap();

        assert_eq!(backup.parent(), path.parent());
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("Demo.pbxproj.json."));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{}");
    }

    #[test]
    fn backup_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_backup(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code, "backup_failed");
    }
}
