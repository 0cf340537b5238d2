//! Error taxonomy for the remedy workspace
//!
//! Each concern carries its own error enum; `RemedyError` aggregates
//! them at the library boundary. Library code returns these and never
//! calls `std::process::exit()`.

use thiserror::Error;

/// Top-level error type returned by remedy library operations
#[derive(Error, Debug)]
pub enum RemedyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading and parsing errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file at {path}: {reason}")]
    InvalidFile { path: String, reason: String },

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to read configuration at {path}: {reason}")]
    ReadFailed { path: String, reason: String },
}

/// Ticket lock acquisition and maintenance errors
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Ticket '{ticket_id}' is locked by another process (PID {pid}, held {held_for})")]
    AlreadyHeld {
        ticket_id: String,
        pid: u32,
        held_for: String,
    },

    #[error("Lock stamp at {path} is corrupt: {reason}")]
    CorruptStamp { path: String, reason: String },

    #[error("Lock directory error at {path}: {reason}")]
    Directory { path: String, reason: String },

    #[error("IO error on lock for '{ticket_id}': {source}")]
    Io {
        ticket_id: String,
        #[source]
        source: std::io::Error,
    },
}

/// Diff parsing and application errors
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Diff parsing failed: {reason}")]
    ParseFailed { reason: String },

    #[error("No hunks found in diff")]
    NoHunks,

    #[error("Hunk context at line {expected_line} not found (searched within {window} lines)")]
    ContextNotFound { expected_line: usize, window: usize },

    #[error("External apply tool failed: {reason}")]
    ToolFailed { reason: String },

    #[error("External apply tool timed out after {timeout_secs}s")]
    ToolTimeout { timeout_secs: u64 },

    #[error("Applied content does not match the expected result")]
    ExpectedMismatch,

    #[error("Fallback rejected: similarity {ratio:.2} below threshold")]
    FallbackRejected { ratio: f64 },
}

/// Static patch validation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("File path is empty")]
    EmptyPath,

    #[error("File path contains parent directory traversal: {path}")]
    PathTraversal { path: String },

    #[error("File path contains control characters")]
    ControlCharacters,

    #[error("File '{path}' is not in the repository listing")]
    UnknownFile { path: String },

    #[error("Diff content is empty")]
    EmptyDiff,

    #[error("Diff content is not structured like a diff")]
    NotDiffLike,

    #[error("Placeholder content detected: {pattern}")]
    PlaceholderDetected { pattern: String },
}

/// Fix-loop orchestration errors
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Planning failed for ticket '{ticket_id}': {reason}")]
    PlanningFailed { ticket_id: String, reason: String },

    #[error("Task plan for ticket '{ticket_id}' is missing required field '{field}'")]
    IncompletePlan { ticket_id: String, field: String },

    #[error("Collaborator '{collaborator}' failed: {reason}")]
    CollaboratorFailed {
        collaborator: String,
        reason: String,
    },

    #[error("Test run timed out after {timeout_secs}s")]
    QaTimeout { timeout_secs: u64 },

    #[error("Attempt log error for ticket '{ticket_id}': {reason}")]
    AttemptLog { ticket_id: String, reason: String },
}
