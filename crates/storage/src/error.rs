//! Store error types
//!
//! These are the failures a column-store driver reports. The engine
//! classifies them; only [`StoreError::AllNodesFailed`] marks a session as
//! unusable.

use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by the column store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No replica could be reached; the connection is unusable
    #[error("all nodes failed: {0}")]
    AllNodesFailed(String),

    /// Statement was rejected by the server
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Keyspace does not exist
    #[error("keyspace '{0}' does not exist")]
    KeyspaceNotFound(String),

    /// Table does not exist
    #[error("table '{keyspace}.{table}' does not exist")]
    TableNotFound {
        /// Keyspace name
        keyspace: String,
        /// Table name
        table: String,
    },

    /// Schema element already exists (only for statements without IF NOT EXISTS)
    #[error("'{0}' already exists")]
    AlreadyExists(String),

    /// Malformed paging state
    #[error("invalid paging state")]
    InvalidPagingState,
}

impl StoreError {
    /// Whether this error means the whole cluster is unreachable.
    pub fn is_total_outage(&self) -> bool {
        matches!(self, StoreError::AllNodesFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_outage_classification() {
        assert!(StoreError::AllNodesFailed("down".into()).is_total_outage());
        assert!(!StoreError::InvalidQuery("bad".into()).is_total_outage());
        assert!(!StoreError::KeyspaceNotFound("ks".into()).is_total_outage());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::TableNotFound {
            keyspace: "ks".into(),
            table: "t".into(),
        };
        assert_eq!(err.to_string(), "table 'ks.t' does not exist");
    }
}
