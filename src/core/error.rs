//! Structured error types.
//!
//! Errors must be classifiable, attributable, and actionable.
//! Every error answers: What failed? Which entity? What can be done next?

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error kind for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Target, group, file or scheme lookup miss.
    ReferenceNotFound,
    /// Path resolution matched several candidates.
    AmbiguousReference,
    /// The entity already exists.
    DuplicateEntity,
    /// The operation would break a graph invariant.
    InvalidGraphState,
    /// Project file could not be read, decoded, encoded or written.
    CodecError,
    /// Transaction operation issued from the wrong state.
    TransactionStateError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReferenceNotFound => write!(f, "reference_not_found"),
            Self::AmbiguousReference => write!(f, "ambiguous_reference"),
            Self::DuplicateEntity => write!(f, "duplicate_entity"),
            Self::InvalidGraphState => write!(f, "invalid_graph_state"),
            Self::CodecError => write!(f, "codec_error"),
            Self::TransactionStateError => write!(f, "transaction_state_error"),
        }
    }
}

/// Structured error with full context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PbxError {
    /// Error kind for classification.
    pub kind: ErrorKind,
    /// Unique error code within the kind.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Component and operation that originated the error.
    pub origin: String,
    /// Whether this error is potentially recoverable.
    pub recoverable: bool,
    /// Hint for recovery action.
    pub recovery_hint: Option<String>,
    /// Candidate matches for ambiguous lookups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl PbxError {
    /// Creates a new error with the given parameters.
    #[must_use]
    pub fn new(
        kind: ErrorKind,
        code: impl Into<String>,
        message: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            origin: origin.into(),
            recoverable: false,
            recovery_hint: None,
            candidates: Vec::new(),
            context: BTreeMap::new(),
        }
    }

    /// Sets whether the error is recoverable.
    #[must_use]
    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Sets the recovery hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    /// Adds context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Lookup miss. The identifier is echoed back in the context.
    #[must_use]
    pub fn not_found(
        code: impl Into<String>,
        identifier: &str,
        origin: impl Into<String>,
    ) -> Self {
        let code = code.into();
        let what = code.strip_suffix("_not_found").unwrap_or(&code).replace('_', " ");
        Self::new(
            ErrorKind::ReferenceNotFound,
            code.clone(),
            format!("No {what} matches '{identifier}'"),
            origin,
        )
        .recoverable(true)
        .with_context("identifier", identifier)
    }

    /// Ambiguous lookup; every candidate is listed.
    #[must_use]
    pub fn ambiguous(identifier: &str, candidates: Vec<String>, origin: impl Into<String>) -> Self {
        let mut err = Self::new(
            ErrorKind::AmbiguousReference,
            "ambiguous_reference",
            format!(
                "'{identifier}' matches {} entries: {}",
                candidates.len(),
                candidates.join(", ")
            ),
            origin,
        )
        .recoverable(true)
        .with_context("identifier", identifier)
        .with_hint("Pass a longer path to pick one candidate");
        err.candidates = candidates;
        err
    }

    /// The entity already exists.
    #[must_use]
    pub fn duplicate(
        code: impl Into<String>,
        message: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::DuplicateEntity, code, message, origin).recoverable(true)
    }

    /// The operation would violate a graph invariant.
    #[must_use]
    pub fn invalid_state(
        code: impl Into<String>,
        message: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::InvalidGraphState, code, message, origin).recoverable(true)
    }

    /// External load/save failure. Fatal for the current invocation.
    #[must_use]
    pub fn codec(
        code: impl Into<String>,
        message: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::CodecError, code, message, origin)
    }

    /// Transaction operation issued from the wrong state.
    #[must_use]
    pub fn transaction_state(
        code: impl Into<String>,
        message: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::TransactionStateError, code, message, origin)
    }
}

impl std::fmt::Display for PbxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.kind, self.code, self.message)
    }
}

impl std::error::Error for PbxError {}

/// Result type using `PbxError`.
pub type Result<T> = std::result::Result<T, PbxError>;

/// Exit codes for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    NotFound = 2,
    Conflict = 3,
    Storage = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

impl From<&PbxError> for ExitCode {
    fn from(err: &PbxError) -> Self {
        match err.kind {
            ErrorKind::ReferenceNotFound => Self::NotFound,
            ErrorKind::AmbiguousReference
            | ErrorKind::DuplicateEntity
            | ErrorKind::InvalidGraphState => Self::Conflict,
            ErrorKind::CodecError | ErrorKind::TransactionStateError => Self::Storage,
        }
    }
}
