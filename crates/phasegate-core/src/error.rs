//! Error types for phasegate operations.
//!
//! This module defines every error variant the workflow core can report, from
//! catalog lookups to gate checks and persistence. All errors are synchronous
//! and recoverable by the caller; nothing here is fatal to the process.

use std::path::PathBuf;
use thiserror::Error;

/// Comprehensive error type for phasegate operations.
///
/// Each variant carries enough context to build a user-facing explanation.
/// Rejected transitions always include a human-readable reason.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PhasegateError {
    // Catalog errors
    /// No catalog is registered for the requested workflow type.
    #[error("unknown workflow type: {0}")]
    UnknownWorkflowType(String),

    /// Phase id is not part of the entity's catalog.
    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    /// Catalog definition violates the ordering rules.
    #[error("invalid catalog for {workflow}: {reason}")]
    InvalidCatalog {
        /// Workflow type the catalog was registered for.
        workflow: String,
        /// What is wrong with the catalog.
        reason: String,
    },

    // Transition errors
    /// Requested move is not the immediate successor of the current phase.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Prerequisite gate has not opened.
    #[error("gate blocked for {phase}: {reason}")]
    GateBlocked {
        /// Phase the caller tried to enter.
        phase: String,
        /// Why the gate is closed.
        reason: String,
    },

    /// Stored entity changed between load and save.
    #[error("concurrent modification of {entity}: expected version {expected}, found {found}")]
    ConcurrentModification {
        /// Entity whose save was rejected.
        entity: String,
        /// Version the writer loaded.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },

    /// Completion percentage outside 0..=100.
    #[error("invalid completion percentage: {0} (must be 0-100)")]
    InvalidCompletion(u8),

    // Entity errors
    /// Entity with the given id was not found.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// Entity with the given id already exists.
    #[error("entity already exists: {0}")]
    EntityAlreadyExists(String),

    /// Invalid entity id format.
    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    /// Stored entity could not be decoded.
    #[error("corrupted state file: {0}")]
    CorruptedState(PathBuf),

    // File system errors
    /// Path not found in the file system.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// Invalid path provided.
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),

    /// Permission denied for the specified operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Error reading file.
    #[error("file read error: {0}")]
    FileReadError(String),

    /// Error writing file.
    #[error("file write error: {0}")]
    FileWriteError(String),

    // Config errors
    /// Invalid configuration detected.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Error parsing configuration file.
    #[error("config parse error: {0}")]
    ConfigParseError(String),

    // IO and system errors
    /// Standard IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context from anyhow.
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PhasegateError {
    /// Builds a [`PhasegateError::GateBlocked`] from a phase id and reason.
    pub fn gate_blocked(phase: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GateBlocked {
            phase: phase.into(),
            reason: reason.into(),
        }
    }

    /// Human-readable reason suitable for explaining a rejection in a UI.
    ///
    /// For gate blocks this is the evaluator's reason alone; other variants
    /// fall back to their display text.
    pub fn reason(&self) -> String {
        match self {
            Self::GateBlocked { reason, .. } => reason.clone(),
            Self::InvalidTransition(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for phasegate operations.
///
/// All fallible operations return this type, using [`PhasegateError`] for error variants.
pub type Result<T> = std::result::Result<T, PhasegateError>;
