//! Error handling module
//!
//! Provides unified error types for the synchronization engine and its
//! collaborators.

use thiserror::Error;

use crate::config::ConfigError;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Document store error: {0}")]
    Store(String),

    #[error("Locale registry error: {0}")]
    Registry(String),

    #[error("Timed out after {millis}ms: {operation}")]
    Timeout { operation: String, millis: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Task queue error: {0}")]
    Queue(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether the failure came from an external collaborator rather than
    /// from the engine itself.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            SyncError::Store(_) | SyncError::Registry(_) | SyncError::Timeout { .. }
        )
    }
}

impl From<validator::ValidationErrors> for SyncError {
    fn from(errors: validator::ValidationErrors) -> Self {
        SyncError::Validation(errors.to_string())
    }
}

/// Result type alias used across the crate
pub type SyncResult<T> = Result<T, SyncError>;

/// Helper function to create a store error
pub fn store_error(msg: impl Into<String>) -> SyncError {
    SyncError::Store(msg.into())
}

/// Helper function to create a registry error
pub fn registry_error(msg: impl Into<String>) -> SyncError {
    SyncError::Registry(msg.into())
}

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> SyncError {
    SyncError::NotFound(msg.into())
}
