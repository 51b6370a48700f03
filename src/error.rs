//! Error types for the Node Registry
//!
//! Provides structured error types for the registry store, the registry
//! service and the REST API.

use thiserror::Error;

/// Unified error type for the registry
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Node Registry Errors
    // =========================================================================
    #[error("Node not found: {client_id} (run {run_id})")]
    NodeNotFound { client_id: String, run_id: String },

    #[error("No fields to update for node {client_id} (run {run_id})")]
    NothingToUpdate { client_id: String, run_id: String },

    #[error("Corrupt node record: {0}")]
    CorruptRecord(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {store}")]
    StoreUnavailable { store: String },

    // =========================================================================
    // API Errors
    // =========================================================================
    #[error("Invalid action: {action}")]
    InvalidAction { action: String },

    #[error("API request validation failed: {0}")]
    ApiValidation(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NodeNotFound { .. } | Error::InvalidAction { .. } | Error::ApiValidation(_)
        )
    }

    /// Check if this error is transient
    ///
    /// The registry never retries on its own; callers may use this to decide.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::StoreUnavailable { .. } => true,
            Error::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

/// Result type alias for the registry
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        let err = Error::InvalidAction {
            action: "UNREGISTER".into(),
        };
        assert!(err.is_client_error());
        assert!(!err.is_transient());

        let err = Error::NodeNotFound {
            client_id: "c".into(),
            run_id: "r".into(),
        };
        assert!(err.is_client_error());

        let err = Error::Internal("boom".into());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_transient_errors() {
        let err = Error::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());

        let err = Error::StoreUnavailable {
            store: "memory".into(),
        };
        assert!(err.is_transient());

        let err = Error::CorruptRecord("bad uuid".into());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = Error::NodeNotFound {
            client_id: "abc".into(),
            run_id: "run1".into(),
        };
        assert_eq!(err.to_string(), "Node not found: abc (run run1)");
    }
}
