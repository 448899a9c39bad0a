//! Error taxonomy for the OpsAudit workspace.
//!
//! Three caller-visible failure classes: invalid input (rejected before any
//! mutation), missing referent, and storage failure (the in-flight
//! transaction is rolled back). Extraction misses, broadcast drops, and
//! duplicate reminders are deliberately NOT errors — they are logged and
//! swallowed where they occur.

use thiserror::Error;

/// Workspace-wide error type.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Invalid status/result value, non-positive id, malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced task/reminder does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The transactional store failed a read/write.
    #[error("storage error: {0}")]
    Storage(String),

    /// Event hub is gone (process shutting down).
    #[error("event hub unavailable: {0}")]
    Hub(String),

    /// Bad configuration file.
    #[error("config error: {0}")]
    Config(String),
}

impl AuditError {
    /// Wrap any storage-layer error.
    pub fn storage(e: impl std::fmt::Display) -> Self {
        AuditError::Storage(e.to_string())
    }

    /// Validation shortcut.
    pub fn validation(msg: impl Into<String>) -> Self {
        AuditError::Validation(msg.into())
    }

    /// Not-found shortcut.
    pub fn not_found(what: impl Into<String>) -> Self {
        AuditError::NotFound(what.into())
    }
}

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, AuditError>;
