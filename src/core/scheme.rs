//! Schemes: named build/run/test configurations over targets.
//!
//! Schemes live next to the project file rather than inside the graph and
//! refer to targets by name.

use super::error::{PbxError, Result};
use super::graph::ProjectGraph;
use crate::storage::atomic::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeAction {
    Build,
    Run,
    Test,
    Profile,
    Analyze,
    Archive,
}

impl SchemeAction {
    pub const ALL: [Self; 6] = [
        Self::Build,
        Self::Run,
        Self::Test,
        Self::Profile,
        Self::Analyze,
        Self::Archive,
    ];

    /// Build configuration an action uses unless told otherwise.
    #[must_use]
    pub const fn default_configuration(self) -> &'static str {
        match self {
            Self::Build | Self::Run | Self::Test | Self::Analyze => "Debug",
            Self::Profile | Self::Archive => "Release",
        }
    }
}

impl std::fmt::Display for SchemeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Build => "build",
            Self::Run => "run",
            Self::Test => "test",
            Self::Profile => "profile",
            Self::Analyze => "analyze",
            Self::Archive => "archive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(default)]
    pub targets: Vec<String>,
    pub configuration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheme {
    pub name: String,
    /// Shared schemes are visible to every user of the project.
    #[serde(default = "default_shared")]
    pub shared: bool,
    #[serde(default)]
    pub actions: BTreeMap<SchemeAction, ActionConfig>,
}

const fn default_shared() -> bool {
    true
}

impl Scheme {
    #[must_use]
    pub fn new(name: impl Into<String>, shared: bool) -> Self {
        let actions = SchemeAction::ALL
            .into_iter()
            .map(|action| {
                (
                    action,
                    ActionConfig {
                        targets: Vec::new(),
                        configuration: action.default_configuration().to_string(),
                    },
                )
            })
            .collect();
        Self {
            name: name.into(),
            shared,
            actions,
        }
    }

    /// Every target name the scheme mentions, deduplicated and sorted.
    #[must_use]
    pub fn target_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .actions
            .values()
            .flat_map(|a| a.targets.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// All schemes of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeStore {
    #[serde(default)]
    schemes: BTreeMap<String, Scheme>,
}

impl SchemeStore {
    /// Where the schemes of `project` are kept: `Demo.pbxproj.json` maps to
    /// `Demo.pbxproj.schemes.json`.
    #[must_use]
    pub fn path_for(project: &Path) -> PathBuf {
        let stem = project
            .file_stem()
            .map_or_else(|| "project".to_string(), |s| s.to_string_lossy().to_string());
        project.with_file_name(format!("{stem}.schemes.json"))
    }

    /// Loads the store; a missing file is an empty store.
    ///
    /// # Errors
    /// Returns a codec error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path).map_err(|e| {
            PbxError::codec("scheme_read_failed", e.to_string(), "scheme:load")
                .with_context("path", path.display().to_string())
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            PbxError::codec("scheme_malformed", e.to_string(), "scheme:load")
                .with_context("path", path.display().to_string())
        })
    }

    /// Writes the store atomically.
    ///
    /// # Errors
    /// Returns a codec error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_vec_pretty(self)
            .map_err(|e| PbxError::codec("scheme_encode_failed", e.to_string(), "scheme:save"))?;
        json.push(b'\n');
        write_atomic(path, &json).map_err(|e| {
            PbxError::codec("scheme_write_failed", e.to_string(), "scheme:save")
                .with_context("path", path.display().to_string())
        })?;
        debug!(path = %path.display(), schemes = self.schemes.len(), "saved schemes");
        Ok(())
    }

    pub fn list(&self) -> impl Iterator<Item = &Scheme> {
        self.schemes.values()
    }

    /// # Errors
    /// Returns `scheme_not_found` for unknown names.
    pub fn get(&self, name: &str) -> Result<&Scheme> {
        self.schemes
            .get(name)
            .ok_or_else(|| PbxError::not_found("scheme_not_found", name, "scheme:get"))
    }

    /// # Errors
    /// Returns `scheme_exists` if the name is taken.
    pub fn create(&mut self, name: &str, shared: bool) -> Result<&Scheme> {
        if name.trim().is_empty() {
            return Err(PbxError::invalid_state(
                "empty_scheme_name",
                "Scheme name cannot be empty",
                "scheme:create",
            ));
        }
        if self.schemes.contains_key(name) {
            return Err(PbxError::duplicate(
                "scheme_exists",
                format!("Scheme '{name}' already exists"),
                "scheme:create",
            ));
        }
        Ok(self
            .schemes
            .entry(name.to_string())
            .or_insert_with(|| Scheme::new(name, shared)))
    }

    /// Adds a target to one action, or to build, run and test when no
    /// action is given.
    ///
    /// # Errors
    /// Returns `scheme_not_found`, or `scheme_target_exists` if every
    /// selected action already lists the target.
    pub fn add_target(
        &mut self,
        scheme: &str,
        target: &str,
        action: Option<SchemeAction>,
    ) -> Result<Vec<SchemeAction>> {
        let entry = self
            .schemes
            .get_mut(scheme)
            .ok_or_else(|| PbxError::not_found("scheme_not_found", scheme, "scheme:add_target"))?;
        let selected = action.map_or_else(
            || vec![SchemeAction::Build, SchemeAction::Run, SchemeAction::Test],
            |a| vec![a],
        );

        let mut added = Vec::new();
        for action in selected {
            let config = entry.actions.entry(action).or_insert_with(|| ActionConfig {
                targets: Vec::new(),
                configuration: action.default_configuration().to_string(),
            });
            if !config.targets.iter().any(|t| t == target) {
                config.targets.push(target.to_string());
                added.push(action);
            }
        }
        if added.is_empty() {
            return Err(PbxError::duplicate(
                "scheme_target_exists",
                format!("Scheme '{scheme}' already lists '{target}'"),
                "scheme:add_target",
            ));
        }
        Ok(added)
    }

    /// Drops a removed target from every scheme. Returns how many action
    /// entries were removed.
    pub fn prune_target(&mut self, target: &str) -> usize {
        let mut removed = 0;
        for scheme in self.schemes.values_mut() {
            for config in scheme.actions.values_mut() {
                let before = config.targets.len();
                config.targets.retain(|t| t != target);
                removed += before - config.targets.len();
            }
        }
        removed
    }

    /// `(scheme, target)` pairs naming targets the graph does not have.
    #[must_use]
    pub fn stale_targets(&self, graph: &ProjectGraph) -> Vec<(String, String)> {
        self.schemes
            .values()
            .flat_map(|s| {
                s.target_names()
                    .into_iter()
                    .filter(|t| graph.target_id(t).is_err())
                    .map(|t| (s.name.clone(), t.to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
