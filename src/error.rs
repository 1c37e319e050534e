//! Error taxonomy shared by every subsystem.
//!
//! One variant per kind named in the core's error taxonomy. Library code
//! never panics or writes to stdio on a recoverable failure; every fallible
//! public operation returns a [`NexusResult`].

use thiserror::Error;

use crate::symbol::SymbolKind;

/// Result alias used throughout the crate.
pub type NexusResult<T> = Result<T, NexusError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NexusError {
    #[error("invalid input in {segment}: {message}")]
    InvalidInput { segment: String, message: String },

    #[error("duplicate {scope} id: {id}")]
    DuplicateId { scope: String, id: String },

    #[error("unknown reference to {kind} {id}")]
    UnknownReference { kind: String, id: String },

    #[error("unresolved symbol `{name}` (constraint {constraint:?}) requested by `{requester}`")]
    Unresolved {
        name: String,
        constraint: Option<String>,
        requester: String,
    },

    #[error("symbol `{name}` resolved to kind {found:?}, expected {expected:?}")]
    KindMismatch {
        name: String,
        expected: SymbolKind,
        found: SymbolKind,
    },

    #[error("version conflict on `{name}`: versions {versions:?} are simultaneously reachable")]
    VersionConflict {
        name: String,
        versions: Vec<String>,
        providers: Vec<String>,
    },

    #[error("pass `{pass}` failed: {message}")]
    PassFailed { pass: String, message: String },

    #[error("out of resources: {resource}")]
    OutOfResources { resource: String },

    #[error("cancelled after stage `{last_stage}` (iteration {last_iteration})")]
    Cancelled {
        last_stage: String,
        last_iteration: usize,
    },

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl NexusError {
    /// Maps to the exit code table in the CLI surface (spec.md §6); used only
    /// by the thin CLI binary, never by library code.
    pub fn exit_code(&self) -> i32 {
        match self {
            NexusError::InvalidInput { .. } => 1,
            NexusError::UnknownReference { .. } => 2,
            NexusError::DuplicateId { .. } => 3,
            NexusError::Unresolved { .. } => 5,
            NexusError::KindMismatch { .. } => 5,
            NexusError::VersionConflict { .. } => 5,
            NexusError::PassFailed { .. } => 4,
            NexusError::OutOfResources { .. } => 6,
            NexusError::Cancelled { .. } => 6,
            NexusError::Internal(_) => 6,
        }
    }
}
