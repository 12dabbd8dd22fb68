//! Command bodies and their results
//!
//! These are the shapes clients send inside `{"<commandName>": {...}}` and
//! the data returned for them. Unknown fields are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use tessera_core::CollectionOptions;

use crate::error::Error;

/// `createNamespace` / `dropNamespace`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceRequest {
    /// Namespace name
    pub name: String,
}

/// `createCollection`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCollectionRequest {
    /// Collection name
    pub name: String,
    /// Collection options
    #[serde(default)]
    pub options: CollectionOptions,
}

/// `deleteCollection`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteCollectionRequest {
    /// Collection name
    pub name: String,
}

/// Options of `findCollections`
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FindCollectionsOptions {
    /// Return full definitions instead of names
    #[serde(default)]
    pub explain: bool,
}

/// `findCollections`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FindCollectionsRequest {
    /// Options
    #[serde(default)]
    pub options: FindCollectionsOptions,
}

/// `insertOne`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InsertOneRequest {
    /// Document to insert
    pub document: JsonValue,
}

/// Options of `insertMany`
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InsertManyOptions {
    /// Stop at the first failure
    #[serde(default)]
    pub ordered: bool,
}

/// `insertMany`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InsertManyRequest {
    /// Documents to insert
    pub documents: Vec<JsonValue>,
    /// Options
    #[serde(default)]
    pub options: InsertManyOptions,
}

/// Options of `find`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FindOptions {
    /// Maximum documents returned
    #[serde(default)]
    pub limit: Option<usize>,
    /// Documents skipped (field sort only)
    #[serde(default)]
    pub skip: Option<usize>,
    /// Continuation token from a previous page
    #[serde(default)]
    pub page_state: Option<String>,
    /// Add `$similarity` to each document (vector sort only)
    #[serde(default)]
    pub include_similarity: bool,
    /// Add `$scores` to each document (lexical or hybrid sort only)
    #[serde(default)]
    pub include_scores: bool,
}

/// `find`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FindRequest {
    /// Filter clause
    #[serde(default)]
    pub filter: Option<JsonValue>,
    /// Sort clause
    #[serde(default)]
    pub sort: Option<JsonValue>,
    /// Projection clause
    #[serde(default)]
    pub projection: Option<JsonValue>,
    /// Options
    #[serde(default)]
    pub options: FindOptions,
}

/// Options of `findOne`
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FindOneOptions {
    /// Add `$similarity`
    #[serde(default)]
    pub include_similarity: bool,
    /// Add `$scores`
    #[serde(default)]
    pub include_scores: bool,
}

/// `findOne`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FindOneRequest {
    /// Filter clause
    #[serde(default)]
    pub filter: Option<JsonValue>,
    /// Sort clause
    #[serde(default)]
    pub sort: Option<JsonValue>,
    /// Projection clause
    #[serde(default)]
    pub projection: Option<JsonValue>,
    /// Options
    #[serde(default)]
    pub options: FindOneOptions,
}

impl From<FindOneRequest> for FindRequest {
    fn from(request: FindOneRequest) -> Self {
        FindRequest {
            filter: request.filter,
            sort: request.sort,
            projection: request.projection,
            options: FindOptions {
                limit: Some(1),
                include_similarity: request.options.include_similarity,
                include_scores: request.options.include_scores,
                ..FindOptions::default()
            },
        }
    }
}

/// `countDocuments`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CountRequest {
    /// Filter clause
    #[serde(default)]
    pub filter: Option<JsonValue>,
}

/// Options of `updateOne`
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOneOptions {
    /// Insert when nothing matches
    #[serde(default)]
    pub upsert: bool,
}

/// `updateOne`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOneRequest {
    /// Filter clause
    #[serde(default)]
    pub filter: Option<JsonValue>,
    /// Update clause
    pub update: JsonValue,
    /// Sort clause choosing among several matches
    #[serde(default)]
    pub sort: Option<JsonValue>,
    /// Options
    #[serde(default)]
    pub options: UpdateOneOptions,
}

/// `deleteOne`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteOneRequest {
    /// Filter clause
    #[serde(default)]
    pub filter: Option<JsonValue>,
    /// Sort clause choosing among several matches
    #[serde(default)]
    pub sort: Option<JsonValue>,
}

/// `deleteMany`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteManyRequest {
    /// Filter clause
    #[serde(default)]
    pub filter: Option<JsonValue>,
}

// =============================================================================
// Results
// =============================================================================

/// Result of `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResult {
    /// Projected documents
    pub documents: Vec<JsonValue>,
    /// Token for the next page, if more documents remain
    pub next_page_state: Option<String>,
}

/// Result of `countDocuments`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountResult {
    /// Matching documents counted (capped)
    pub count: usize,
    /// True when the cap was reached
    pub more_data: bool,
}

/// Result of `insertOne` / `insertMany`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertResult {
    /// Ids of inserted documents, in request order
    pub inserted_ids: Vec<JsonValue>,
    /// Per-document failures as (request position, error)
    pub failures: Vec<(usize, Error)>,
}

/// Result of `updateOne`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    /// Documents matched (0 or 1)
    pub matched_count: usize,
    /// Documents modified (0 or 1)
    pub modified_count: usize,
    /// Id of an upserted document
    pub upserted_id: Option<JsonValue>,
}

/// Result of `deleteOne` / `deleteMany`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    /// Documents deleted
    pub deleted_count: usize,
    /// True when more matching documents may remain (`deleteMany`)
    pub more_data: bool,
}
