//! Core types for Tessera
//!
//! This crate defines the vocabulary shared by every layer:
//! - Identifiers: [`TenantId`], [`NamespaceName`], [`CollectionName`], [`DocumentId`]
//! - Collection options: vector, lexical and indexing configuration
//! - [`Limits`]: per-tenant resource caps and request/document size limits
//!
//! Nothing in here touches the store; higher crates build on these types.

#![warn(missing_docs)]

pub mod limits;
pub mod options;
pub mod types;

pub use limits::{LimitError, Limits};
pub use options::{
    CollectionOptions, IndexingOptions, LexicalOptions, OptionsError, SimilarityMetric,
    VectorOptions, DEFAULT_ANALYZER,
};
pub use types::{
    json_type_name, CollectionName, DocumentId, DocumentIdError, NameError, NamespaceName, TenantId, ID_FIELD,
    LEXICAL_FIELD, VECTOR_FIELD,
};
