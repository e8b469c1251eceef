//! Error types for the Kredible platform
//!
//! Provides a unified error type shared across the workspace crates.

use thiserror::Error;

/// Result type alias using KredibleError
pub type Result<T> = std::result::Result<T, KredibleError>;

/// Unified error type for Kredible operations
#[derive(Debug, Error)]
pub enum KredibleError {
    /// A caller-supplied value failed validation before any write happened
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced record does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A state transition was attempted from a state that does not permit it
    #[error("{kind} {id} is not in a state that allows this: {detail}")]
    InvalidState {
        kind: &'static str,
        id: String,
        detail: String,
    },

    /// Optimistic-concurrency version mismatch
    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    // Wallet errors
    #[error("wallet error: {0}")]
    Wallet(#[from] crate::types::wallet::WalletError),

    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    // Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl KredibleError {
    /// Shorthand for an [`KredibleError::InvalidInput`] with a formatted message
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        KredibleError::InvalidInput(msg.into())
    }

    /// Shorthand for a [`KredibleError::NotFound`]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        KredibleError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for an [`KredibleError::InvalidState`]
    pub fn invalid_state(
        kind: &'static str,
        id: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        KredibleError::InvalidState {
            kind,
            id: id.into(),
            detail: detail.into(),
        }
    }
}

// Implement From for common external error types
impl From<serde_json::Error> for KredibleError {
    fn from(err: serde_json::Error) -> Self {
        KredibleError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for KredibleError {
    fn from(err: anyhow::Error) -> Self {
        KredibleError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = KredibleError::not_found("user", "GAXB...K2M4");
        assert!(err.to_string().contains("user not found"));
        assert!(err.to_string().contains("GAXB...K2M4"));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = KredibleError::invalid_state("loan request", "abc", "status is funded");
        assert!(err.to_string().contains("loan request abc"));
        assert!(err.to_string().contains("status is funded"));
    }
}
