//! Resource and size limits
//!
//! Collection and index caps are per tenant database. Size limits bound the
//! work a single request can cause: the request body is measured before it is
//! parsed, documents before they are shredded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configurable limits.
///
/// Every field has a default, so a partial `[limits]` table in the config
/// file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum collections per tenant database (default: 5)
    pub max_collections: usize,

    /// Maximum store indexes per tenant database (default: 50)
    pub max_indexes: usize,

    /// Maximum raw request body in bytes (default: 16MB)
    pub max_request_bytes: usize,

    /// Maximum serialized document size in bytes (default: 4MB)
    pub max_document_bytes: usize,

    /// Maximum vector dimension (default: 4096)
    pub max_vector_dimension: usize,

    /// Maximum `limit` for vector and lexical queries (default: 1000)
    pub max_page_size: usize,

    /// Page size for plain scans (default: 20)
    pub default_page_size: usize,

    /// Maximum documents read for an in-memory field sort (default: 10000)
    pub max_sort_read: usize,

    /// Maximum values in an `$in`/`$nin` list (default: 100)
    pub max_in_values: usize,

    /// Maximum documents in one `insertMany` (default: 100)
    pub max_documents_per_insert: usize,

    /// Maximum documents removed by one `deleteMany` call (default: 20)
    pub max_documents_per_delete: usize,

    /// Maximum documents `countDocuments` will count (default: 1000)
    pub max_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_collections: 5,
            max_indexes: 50,
            max_request_bytes: 16 * 1024 * 1024, // 16MB
            max_document_bytes: 4 * 1024 * 1024, // 4MB
            max_vector_dimension: 4096,
            max_page_size: 1000,
            default_page_size: 20,
            max_sort_read: 10_000,
            max_in_values: 100,
            max_documents_per_insert: 100,
            max_documents_per_delete: 20,
            max_count: 1000,
        }
    }
}

impl Limits {
    /// Create limits with small values for testing
    pub fn with_small_limits() -> Self {
        Limits {
            max_collections: 3,
            max_indexes: 30,
            max_request_bytes: 4096,
            max_document_bytes: 1024,
            max_vector_dimension: 16,
            max_page_size: 50,
            default_page_size: 5,
            max_sort_read: 100,
            max_in_values: 10,
            max_documents_per_insert: 10,
            max_documents_per_delete: 5,
            max_count: 20,
        }
    }

    /// Reject a raw request body larger than `max_request_bytes`.
    ///
    /// Runs before any parsing, so the cost of rejection does not depend on
    /// whether the body is well formed.
    pub fn check_request_size(&self, len: usize) -> Result<(), LimitError> {
        if len > self.max_request_bytes {
            return Err(LimitError::RequestTooLarge {
                actual: len,
                max: self.max_request_bytes,
            });
        }
        Ok(())
    }

    /// Reject a serialized document larger than `max_document_bytes`.
    pub fn check_document_size(&self, len: usize) -> Result<(), LimitError> {
        if len > self.max_document_bytes {
            return Err(LimitError::DocumentTooLarge {
                actual: len,
                max: self.max_document_bytes,
            });
        }
        Ok(())
    }
}

/// Limit validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    /// Request body exceeds maximum size
    #[error("request size {actual} bytes exceeds maximum {max} bytes")]
    RequestTooLarge {
        /// Actual size
        actual: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Document exceeds maximum size
    #[error("document size {actual} bytes exceeds maximum {max} bytes")]
    DocumentTooLarge {
        /// Actual size
        actual: usize,
        /// Maximum allowed
        max: usize,
    },
}
