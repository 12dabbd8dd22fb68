//! Engine error types
//!
//! Every failure the engine reports is an [`Error`] variant with typed fields.
//! Each variant belongs to exactly one [`ErrorKind`] and carries a stable
//! wire code (`Error::code`) that the response envelope exposes.
//!
//! # Categories
//!
//! | Kind | Variants | Meaning |
//! |------|----------|---------|
//! | Validation | `InvalidRequest`, `InvalidFilter`, `UnindexedFilterPath`, ... | The command cannot be planned |
//! | ResourceLimit | `TooManyCollections`, `TooManyIndexes`, `RequestTooLarge`, `DocumentTooLarge` | A tenant cap or size bound was hit |
//! | Conflict | `CollectionConflict`, `DocumentExists` | State contradicts the command |
//! | Contention | `Contention` | Conditional writes kept losing |
//! | Unavailable | `Unavailable` | The store cannot be reached |
//! | Cursor | `InvalidPageState` | Continuation token rejected |

use tessera_core::{DocumentIdError, LimitError, NameError, OptionsError};
use tessera_storage::StoreError;

use crate::cursor::CursorError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or unplannable command
    Validation,
    /// Tenant quota or size limit
    ResourceLimit,
    /// Existing state contradicts the command
    Conflict,
    /// Conditional-write retries exhausted
    Contention,
    /// Store unreachable
    Unavailable,
    /// Invalid continuation token
    Cursor,
}

impl ErrorKind {
    /// Exception class reported to clients.
    pub fn exception_class(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::ResourceLimit => "ResourceLimitError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::Contention => "ContentionError",
            ErrorKind::Unavailable => "UnavailableError",
            ErrorKind::Cursor => "CursorError",
        }
    }
}

/// Engine errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    // ==================== Validation ====================
    /// Request shape or option is invalid
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Filter clause is malformed
    #[error("invalid filter expression: {reason}")]
    InvalidFilter { reason: String },

    /// Update clause uses an unsupported operator or path
    #[error("unsupported update operation: {reason}")]
    UnsupportedUpdate { reason: String },

    /// Sort clause is malformed
    #[error("invalid sort clause: {reason}")]
    InvalidSort { reason: String },

    /// Filter on a path excluded by the collection's indexing options
    #[error("filter path '{path}' is not indexed")]
    UnindexedFilterPath { path: String },

    /// Sort on a path excluded by the collection's indexing options
    #[error("sort path '{path}' is not indexed")]
    UnindexedSortPath { path: String },

    /// `$vector` used on a collection without vector options
    #[error("vector search is not enabled for collection '{collection}'")]
    VectorNotEnabled { collection: String },

    /// `$lexical` used on a collection without lexical options
    #[error("lexical search is not enabled for collection '{collection}'")]
    LexicalNotEnabled { collection: String },

    /// Vector length differs from the collection dimension
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    VectorDimensionMismatch { expected: usize, actual: usize },

    /// `createCollection` options are invalid
    #[error("{reason}")]
    InvalidOptions { reason: String },

    /// Collection does not exist
    #[error("collection '{collection}' does not exist")]
    CollectionNotFound { collection: String },

    /// Namespace does not exist
    #[error("namespace '{namespace}' does not exist")]
    NamespaceNotFound { namespace: String },

    /// Store rejected a statement for a reason other than an outage
    #[error("store query failed: {message}")]
    StoreQuery { message: String },

    /// Engine configuration is invalid
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    // ==================== Resource limits ====================
    /// Collection cap reached
    #[error("too many collections: {current} of {limit} already exist")]
    TooManyCollections { current: usize, limit: usize },

    /// Index cap reached
    #[error("too many indexes: {current} in use, {requested} more requested, limit {limit}")]
    TooManyIndexes {
        current: usize,
        requested: usize,
        limit: usize,
    },

    /// Request body over the size limit
    #[error("request size {actual} bytes exceeds maximum {max} bytes")]
    RequestTooLarge { actual: usize, max: usize },

    /// Document over the size limit
    #[error("document size {actual} bytes exceeds maximum {max} bytes")]
    DocumentTooLarge { actual: usize, max: usize },

    // ==================== Conflict ====================
    /// Collection exists with different options
    #[error("collection '{collection}' already exists with different settings")]
    CollectionConflict { collection: String },

    /// Insert of an id that is already taken
    #[error("document with _id {id} already exists")]
    DocumentExists { id: String },

    // ==================== Contention ====================
    /// Conditional write lost every attempt
    #[error("document {id} was modified concurrently; gave up after {attempts} attempts")]
    Contention { id: String, attempts: usize },

    // ==================== Unavailable ====================
    /// Store is unreachable
    #[error("server unavailable: {reason}")]
    Unavailable { reason: String },

    // ==================== Cursor ====================
    /// Continuation token rejected
    #[error("invalid page state: {reason}")]
    InvalidPageState { reason: String },
}

impl Error {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRequest { .. }
            | Error::InvalidFilter { .. }
            | Error::UnsupportedUpdate { .. }
            | Error::InvalidSort { .. }
            | Error::UnindexedFilterPath { .. }
            | Error::UnindexedSortPath { .. }
            | Error::VectorNotEnabled { .. }
            | Error::LexicalNotEnabled { .. }
            | Error::VectorDimensionMismatch { .. }
            | Error::InvalidOptions { .. }
            | Error::CollectionNotFound { .. }
            | Error::NamespaceNotFound { .. }
            | Error::StoreQuery { .. }
            | Error::Config { .. } => ErrorKind::Validation,
            Error::TooManyCollections { .. }
            | Error::TooManyIndexes { .. }
            | Error::RequestTooLarge { .. }
            | Error::DocumentTooLarge { .. } => ErrorKind::ResourceLimit,
            Error::CollectionConflict { .. } | Error::DocumentExists { .. } => ErrorKind::Conflict,
            Error::Contention { .. } => ErrorKind::Contention,
            Error::Unavailable { .. } => ErrorKind::Unavailable,
            Error::InvalidPageState { .. } => ErrorKind::Cursor,
        }
    }

    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRequest { .. } => "INVALID_REQUEST",
            Error::InvalidFilter { .. } => "INVALID_FILTER_EXPRESSION",
            Error::UnsupportedUpdate { .. } => "UNSUPPORTED_UPDATE_OPERATION",
            Error::InvalidSort { .. } => "INVALID_SORT_CLAUSE",
            Error::UnindexedFilterPath { .. } => "UNINDEXED_FILTER_PATH",
            Error::UnindexedSortPath { .. } => "UNINDEXED_SORT_PATH",
            Error::VectorNotEnabled { .. } => "VECTOR_SEARCH_NOT_ENABLED",
            Error::LexicalNotEnabled { .. } => "LEXICAL_NOT_ENABLED",
            Error::VectorDimensionMismatch { .. } => "VECTOR_DIMENSION_MISMATCH",
            Error::InvalidOptions { .. } => "INVALID_COLLECTION_OPTIONS",
            Error::CollectionNotFound { .. } => "COLLECTION_NOT_EXIST",
            Error::NamespaceNotFound { .. } => "NAMESPACE_NOT_EXIST",
            Error::StoreQuery { .. } => "SERVER_QUERY_FAILURE",
            Error::Config { .. } => "INVALID_CONFIGURATION",
            Error::TooManyCollections { .. } => "TOO_MANY_COLLECTIONS",
            Error::TooManyIndexes { .. } => "TOO_MANY_INDEXES",
            Error::RequestTooLarge { .. } => "REQUEST_TOO_LARGE",
            Error::DocumentTooLarge { .. } => "DOCUMENT_TOO_LARGE",
            Error::CollectionConflict { .. } => "EXISTING_COLLECTION_DIFFERENT_SETTINGS",
            Error::DocumentExists { .. } => "DOCUMENT_ALREADY_EXISTS",
            Error::Contention { .. } => "CONCURRENCY_FAILURE",
            Error::Unavailable { .. } => "SERVER_UNAVAILABLE",
            Error::InvalidPageState { .. } => "INVALID_PAGE_STATE",
        }
    }

    /// Whether the session that produced this error must be evicted.
    pub fn is_unavailable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
        Error::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_filter(reason: impl Into<String>) -> Self {
        Error::InvalidFilter {
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported_update(reason: impl Into<String>) -> Self {
        Error::UnsupportedUpdate {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_sort(reason: impl Into<String>) -> Self {
        Error::InvalidSort {
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AllNodesFailed(reason) => Error::Unavailable { reason },
            StoreError::KeyspaceNotFound(namespace) => Error::NamespaceNotFound { namespace },
            StoreError::TableNotFound { table, .. } => Error::CollectionNotFound { collection: table },
            other => Error::StoreQuery {
                message: other.to_string(),
            },
        }
    }
}

impl From<LimitError> for Error {
    fn from(e: LimitError) -> Self {
        match e {
            LimitError::RequestTooLarge { actual, max } => Error::RequestTooLarge { actual, max },
            LimitError::DocumentTooLarge { actual, max } => Error::DocumentTooLarge { actual, max },
        }
    }
}

impl From<OptionsError> for Error {
    fn from(e: OptionsError) -> Self {
        Error::InvalidOptions {
            reason: e.to_string(),
        }
    }
}

impl From<NameError> for Error {
    fn from(e: NameError) -> Self {
        Error::invalid_request(e.to_string())
    }
}

impl From<DocumentIdError> for Error {
    fn from(e: DocumentIdError) -> Self {
        Error::invalid_request(e.to_string())
    }
}

impl From<CursorError> for Error {
    fn from(e: CursorError) -> Self {
        Error::InvalidPageState {
            reason: e.to_string(),
        }
    }
}
