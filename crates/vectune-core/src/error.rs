//! Error types for Vectune
//!
//! Every fallible operation in the control loop returns [`TuneError`]. Only a few
//! variants are allowed to stop a cycle; the rest are folded back into a result
//! value by the phase that caught them (see [`TuneError::is_fatal`]).

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for tuning operations
#[derive(Error, Debug)]
pub enum TuneError {
    /// The storage engine could not produce an execution plan
    #[error("Query error: {0}")]
    Query(String),

    /// A storage engine call did not finish in time
    #[error("Storage call '{operation}' timed out after {elapsed:?}")]
    QueryTimeout {
        /// Name of the storage operation
        operation: &'static str,
        /// Configured limit that was exceeded
        elapsed: Duration,
    },

    /// The embedding provider failed; no cycle can proceed without a vector
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The advisory oracle failed or replied with something unusable
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// The advisory oracle did not answer in time
    #[error("Oracle timed out after {0:?}")]
    OracleTimeout(Duration),

    /// Index creation failed
    #[error("Action error: {0}")]
    Action(String),

    /// Scope id cannot be used inside an index name
    #[error("Invalid scope id '{0}': expected 1-40 characters of [A-Za-z0-9_]")]
    InvalidScope(String),

    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for tuning operations
pub type Result<T> = std::result::Result<T, TuneError>;

impl TuneError {
    /// Returns true if this error must abort the controller instead of being
    /// recorded inside a cycle result.
    #[cold]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TuneError::Embedding(_) | TuneError::Config(_) | TuneError::Io(_)
        )
    }

    /// Returns true for failures of the storage engine during observation.
    pub fn is_query_failure(&self) -> bool {
        matches!(self, TuneError::Query(_) | TuneError::QueryTimeout { .. })
    }

    /// Short machine-friendly label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TuneError::Query(_) => "query",
            TuneError::QueryTimeout { .. } => "query_timeout",
            TuneError::Embedding(_) => "embedding",
            TuneError::Oracle(_) => "oracle",
            TuneError::OracleTimeout(_) => "oracle_timeout",
            TuneError::Action(_) => "action",
            TuneError::InvalidScope(_) => "invalid_scope",
            TuneError::Config(_) => "config",
            TuneError::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for TuneError {
    fn from(e: serde_json::Error) -> Self {
        TuneError::Query(format!("Malformed plan document: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(TuneError::Embedding("model offline".into()).is_fatal());
        assert!(TuneError::Config("bad".into()).is_fatal());
        assert!(!TuneError::Query("connection reset".into()).is_fatal());
        assert!(!TuneError::OracleTimeout(Duration::from_secs(1)).is_fatal());
        assert!(!TuneError::Action("permission denied".into()).is_fatal());
    }

    #[test]
    fn test_query_failure_classification() {
        assert!(TuneError::Query("x".into()).is_query_failure());
        assert!(TuneError::QueryTimeout {
            operation: "explain_analyze",
            elapsed: Duration::from_millis(5),
        }
        .is_query_failure());
        assert!(!TuneError::Oracle("x".into()).is_query_failure());
    }

    #[test]
    fn test_display() {
        let err = TuneError::InvalidScope("a-b".into());
        assert!(err.to_string().contains("a-b"));
        assert_eq!(err.kind(), "invalid_scope");
    }

    #[test]
    fn test_json_error_maps_to_query() {
        let err: TuneError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "query");
    }
}
