//! Error types for Mooring
//!
//! Explicit error variants with context, using thiserror.

use thiserror::Error;

/// Result type alias for Mooring operations
pub type Result<T> = std::result::Result<T, Error>;

/// Mooring error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Not-Found Errors
    // =========================================================================
    #[error("Checkpoint not found: {id}")]
    CheckpointNotFound { id: String },

    #[error("Memory item not found: {id}")]
    ItemNotFound { id: String },

    // =========================================================================
    // Execution Errors (captured into ExecutionResult, never propagated)
    // =========================================================================
    #[error("Step '{step_id}' failed: {reason}")]
    StepFailed { step_id: String, reason: String },

    #[error("no step runner configured")]
    NoRunnerConfigured,

    #[error("unknown action: {action}")]
    UnknownAction { action: String },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid project id: {id}, reason: {reason}")]
    InvalidProjectId { id: String, reason: String },

    #[error("Invalid session id: {id}, reason: {reason}")]
    InvalidSessionId { id: String, reason: String },

    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage read failed: {key}, reason: {reason}")]
    StorageReadFailed { key: String, reason: String },

    #[error("Storage write failed: {key}, reason: {reason}")]
    StorageWriteFailed { key: String, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("Embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a checkpoint not found error
    pub fn checkpoint_not_found(id: impl Into<String>) -> Self {
        Self::CheckpointNotFound { id: id.into() }
    }

    /// Create a memory item not found error
    pub fn item_not_found(id: impl Into<String>) -> Self {
        Self::ItemNotFound { id: id.into() }
    }

    /// Create a step failed error
    pub fn step_failed(step_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StepFailed {
            step_id: step_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown action error
    pub fn unknown_action(action: impl Into<String>) -> Self {
        Self::UnknownAction {
            action: action.into(),
        }
    }

    /// Create a storage read failed error
    pub fn storage_read_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StorageReadFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage write failed error
    pub fn storage_write_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StorageWriteFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a transaction failed error
    pub fn transaction_failed(reason: impl Into<String>) -> Self {
        Self::TransactionFailed {
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Check whether the executor captures this error into the
    /// returned `ExecutionResult` instead of propagating it.
    pub fn is_captured(&self) -> bool {
        matches!(
            self,
            Self::StepFailed { .. } | Self::NoRunnerConfigured | Self::UnknownAction { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::checkpoint_not_found("ckpt-42");
        assert!(err.to_string().contains("ckpt-42"));
    }

    #[test]
    fn test_step_failed_display() {
        let err = Error::step_failed("step-1", "boom");
        let msg = err.to_string();
        assert!(msg.contains("step-1"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_error_is_captured() {
        assert!(Error::NoRunnerConfigured.is_captured());
        assert!(Error::unknown_action("fetch").is_captured());
        assert!(!Error::checkpoint_not_found("x").is_captured());
    }
}
