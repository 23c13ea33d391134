//! `ProjectSession` - transactional access to one loaded project file.
//!
//! A session owns the graph. Mutable access is only handed out while a
//! transaction is active, and a transaction ends either in a commit (encode,
//! then atomic replace of the file) or a rollback (whole-graph snapshot
//! restore).
//!
//! ```text
//! Idle ──begin──▶ Active ──commit──▶ Committed ──begin──▶ Active ...
//!                   │
//!                   └──rollback──▶ RolledBack ──begin──▶ Active ...
//! ```

use super::error::{PbxError, Result};
use super::graph::ProjectGraph;
use crate::storage::atomic::write_atomic;
use crate::storage::codec::ProjectCodec;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Transaction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Idle,
    Active,
    Committed,
    RolledBack,
}

/// Whether `commit` reaches the disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    #[default]
    Persist,
    /// Everything runs, including encoding; the final write is skipped.
    DryRun,
}

/// What a successful commit did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub path: PathBuf,
    pub bytes: usize,
    pub written: bool,
}

/// A loaded project plus its transaction state.
pub struct ProjectSession {
    path: PathBuf,
    codec: Box<dyn ProjectCodec>,
    write_mode: WriteMode,
    graph: ProjectGraph,
    state: TransactionState,
    snapshot: Option<ProjectGraph>,
}

impl std::fmt::Debug for ProjectSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectSession")
            .field("path", &self.path)
            .field("codec", &self.codec.format())
            .field("write_mode", &self.write_mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ProjectSession {
    /// Loads a project file.
    ///
    /// # Errors
    /// Returns a codec error if the file cannot be read or is malformed.
    pub fn open(
        path: impl Into<PathBuf>,
        codec: Box<dyn ProjectCodec>,
        write_mode: WriteMode,
    ) -> Result<Self> {
        let path = path.into();
        let graph = codec.load(&path)?;
        debug!(path = %path.display(), format = codec.format(), "loaded project");
        Ok(Self::from_graph(path, codec, write_mode, graph))
    }

    /// Wraps an already-built graph that will be written to `path` on commit.
    #[must_use]
    pub fn from_graph(
        path: impl Into<PathBuf>,
        codec: Box<dyn ProjectCodec>,
        write_mode: WriteMode,
        graph: ProjectGraph,
    ) -> Self {
        Self {
            path: path.into(),
            codec,
            write_mode,
            graph,
            state: TransactionState::Idle,
            snapshot: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub const fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Read-only view of the graph; available in every state.
    #[must_use]
    pub const fn graph(&self) -> &ProjectGraph {
        &self.graph
    }

    /// Mutable view of the graph.
    ///
    /// # Errors
    /// Returns `transaction_not_active` outside an active transaction.
    pub fn graph_mut(&mut self) -> Result<&mut ProjectGraph> {
        if self.state != TransactionState::Active {
            return Err(self.state_error("transaction_not_active", "graph_mut"));
        }
        Ok(&mut self.graph)
    }

    /// Starts a transaction by snapshotting the graph.
    ///
    /// # Errors
    /// Returns a non-recoverable `transaction_already_active` error if a
    /// transaction is already running.
    pub fn begin(&mut self) -> Result<()> {
        if self.state == TransactionState::Active {
            return Err(self
                .state_error("transaction_already_active", "begin")
                .with_hint("Commit or roll back the running transaction first"));
        }
        self.snapshot = Some(self.graph.clone());
        self.state = TransactionState::Active;
        debug!(path = %self.path.display(), "transaction started");
        Ok(())
    }

    /// Encodes the graph and atomically replaces the project file.
    ///
    /// # Errors
    /// Returns an error if no transaction is active, or if encoding or
    /// writing fails; in the latter case the transaction stays active.
    pub fn commit(&mut self) -> Result<CommitOutcome> {
        if self.state != TransactionState::Active {
            return Err(self.state_error("transaction_not_active", "commit"));
        }
        debug_assert_eq!(
            self.graph.cache(),
            &self.graph.rebuilt_cache(),
            "incremental lookup cache diverged from a full rebuild"
        );

        let bytes = self.codec.encode(&self.graph).map_err(|e| {
            PbxError::from(e).with_context("path", self.path.display().to_string())
        })?;
        let written = match self.write_mode {
            WriteMode::Persist => {
                write_atomic(&self.path, &bytes).map_err(|e| {
                    PbxError::codec("write_failed", e.to_string(), "session:commit")
                        .with_context("path", self.path.display().to_string())
                })?;
                true
            }
            WriteMode::DryRun => false,
        };

        self.snapshot = None;
        self.state = TransactionState::Committed;
        info!(
            path = %self.path.display(),
            bytes = bytes.len(),
            written,
            "transaction committed"
        );
        Ok(CommitOutcome {
            path: self.path.clone(),
            bytes: bytes.len(),
            written,
        })
    }

    /// Restores the graph captured by `begin`.
    ///
    /// # Errors
    /// Returns `transaction_not_active` outside an active transaction.
    pub fn rollback(&mut self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(self.state_error("transaction_not_active", "rollback"));
        }
        if let Some(snapshot) = self.snapshot.take() {
            self.graph = snapshot;
        }
        self.state = TransactionState::RolledBack;
        info!(path = %self.path.display(), "transaction rolled back");
        Ok(())
    }

    /// Runs `f` inside a transaction: commit on success, rollback on any
    /// error from `f` or from the commit.
    ///
    /// # Errors
    /// Returns the error from `begin`, `f`, or `commit`.
    pub fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut ProjectGraph) -> Result<T>,
    ) -> Result<(T, CommitOutcome)> {
        self.begin()?;
        let value = match f(&mut self.graph) {
            Ok(value) => value,
            Err(err) => {
                warn!(code = %err.code, "mutation failed; rolling back");
                self.rollback()?;
                return Err(err);
            }
        };
        match self.commit() {
            Ok(outcome) => Ok((value, outcome)),
            Err(err) => {
                warn!(code = %err.code, "commit failed; rolling back");
                self.rollback()?;
                Err(err)
            }
        }
    }

    fn state_error(&self, code: &str, operation: &str) -> PbxError {
        PbxError::transaction_state(
            code,
            format!("Cannot {operation} while the transaction is {:?}", self.state),
            format!("session:{operation}"),
        )
        .with_context("state", format!("{:?}", self.state))
    }
}
