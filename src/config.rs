//! Session configuration resolved from flags and the environment.

use crate::core::error::{PbxError, Result};
use crate::core::scheme::SchemeStore;
use crate::core::transaction::WriteMode;
use crate::core::validator::ValidationContext;
use std::env;
use std::path::{Path, PathBuf};

/// Overrides the directory file references are checked against.
pub const PROJECT_ROOT_ENV: &str = "PBXKIT_PROJECT_ROOT";

const PROJECT_SUFFIXES: [&str; 3] = [".pbxproj.json", ".pbxproj.yaml", ".pbxproj.yml"];

/// Everything one invocation needs to open and write a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub project_path: PathBuf,
    pub write_mode: WriteMode,
    /// Copy the project file aside before mutating it.
    pub backup: bool,
    pub check_filesystem: bool,
    pub project_root: PathBuf,
}

impl SessionConfig {
    /// Resolves the project file and root.
    ///
    /// Without an explicit path, the working directory must contain exactly
    /// one project document.
    ///
    /// # Errors
    /// Returns `project_not_found` when no project file can be located, or
    /// `ambiguous_reference` when several candidates exist.
    pub fn resolve(project: Option<PathBuf>, dry_run: bool, backup: bool) -> Result<Self> {
        let project_path = match project {
            Some(path) => path,
            None => discover_project(&env::current_dir().map_err(|e| {
                PbxError::codec("cwd_unavailable", e.to_string(), "config:resolve")
            })?)?,
        };
        Ok(Self::for_path(project_path, dry_run, backup))
    }

    /// Config for a known project path.
    #[must_use]
    pub fn for_path(project_path: PathBuf, dry_run: bool, backup: bool) -> Self {
        let project_root = env::var(PROJECT_ROOT_ENV).map_or_else(
            |_| default_root(&project_path),
            PathBuf::from,
        );
        Self {
            project_path,
            write_mode: if dry_run {
                WriteMode::DryRun
            } else {
                WriteMode::Persist
            },
            backup,
            check_filesystem: true,
            project_root,
        }
    }

    #[must_use]
    pub fn without_filesystem_checks(mut self) -> Self {
        self.check_filesystem = false;
        self
    }

    #[must_use]
    pub fn validation_context(&self) -> ValidationContext {
        ValidationContext {
            project_root: self.project_root.clone(),
            check_filesystem: self.check_filesystem,
        }
    }

    #[must_use]
    pub fn schemes_path(&self) -> PathBuf {
        SchemeStore::path_for(&self.project_path)
    }

    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        matches!(self.write_mode, WriteMode::DryRun)
    }
}

fn default_root(project_path: &Path) -> PathBuf {
    match project_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Finds the single project document in `dir`.
///
/// # Errors
/// Returns `project_not_found` or `ambiguous_reference`.
pub fn discover_project(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        PbxError::codec("read_dir_failed", e.to_string(), "config:discover")
            .with_context("dir", dir.display().to_string())
    })?;
    let mut found: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| PROJECT_SUFFIXES.iter().any(|s| n.ends_with(s)))
        })
        .collect();
    found.sort();

    match found.len() {
        0 => Err(PbxError::not_found(
            "project_not_found",
            &dir.display().to_string(),
            "config:discover",
        )
        .with_hint("Pass --project or set PBXKIT_PROJECT")),
        1 => Ok(found.remove(0)),
        _ => Err(PbxError::ambiguous(
            &dir.display().to_string(),
            found.iter().map(|p| p.display().to_string()).collect(),
            "config:discover",
        )
        .with_hint("Pass --project to pick one")),
    }
}
