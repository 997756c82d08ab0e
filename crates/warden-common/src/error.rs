//! Error types for OpenWarden bookkeeping paths

use thiserror::Error;

/// OpenWarden error type for bookkeeping faults (persistence, collaborator
/// calls). Quota and safety breaches are not errors of this kind; they are
/// [`crate::Violation`] values returned to the caller.
#[derive(Error, Debug)]
pub enum WardenError {
    /// IO error from log append or snapshot write
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External collaborator (runbook suggester, vector backend) failed
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for OpenWarden bookkeeping paths
pub type WardenResult<T> = Result<T, WardenError>;
