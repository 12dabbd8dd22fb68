//! Command enum defining every Tessera operation.
//!
//! A request body is a JSON object with exactly one member; the member name
//! selects the variant and its value holds the command's fields:
//!
//! ```text
//! { "find": { "filter": {"status": "active"}, "options": {"limit": 10} } }
//! ```
//!
//! Commands are pure data. Parsing distinguishes an unknown command name
//! (`NO_COMMAND_MATCHED`) from a known command with bad fields
//! (`COMMAND_FIELD_INVALID`).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use tessera_engine::{
    CountRequest, CreateCollectionRequest, DeleteCollectionRequest, DeleteManyRequest,
    DeleteOneRequest, FindCollectionsRequest, FindOneRequest, FindRequest, InsertManyRequest,
    InsertOneRequest, NamespaceRequest, UpdateOneRequest,
};

use crate::{Error, Result};

/// Body of a command without fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyRequest {}

/// Where a command operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Tenant database
    Tenant,
    /// One namespace
    Namespace,
    /// One collection
    Collection,
}

/// A self-contained, serializable command.
///
/// | Scope | Commands |
/// |-------|----------|
/// | Tenant | `createNamespace`, `dropNamespace`, `findNamespaces`, `findVectorProviders`, `findRerankingProviders` |
/// | Namespace | `createCollection`, `deleteCollection`, `findCollections` |
/// | Collection | `insertOne`, `insertMany`, `find`, `findOne`, `countDocuments`, `updateOne`, `deleteOne`, `deleteMany` |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    // ==================== Tenant ====================
    /// Create a namespace.
    CreateNamespace(NamespaceRequest),
    /// Drop a namespace and everything in it.
    DropNamespace(NamespaceRequest),
    /// List namespaces.
    FindNamespaces(EmptyRequest),
    /// Embedding providers the deployment offers.
    #[serde(alias = "findEmbeddingProviders")]
    FindVectorProviders(EmptyRequest),
    /// Reranking providers the deployment offers.
    FindRerankingProviders(EmptyRequest),

    // ==================== Namespace ====================
    /// Create a collection.
    CreateCollection(CreateCollectionRequest),
    /// Delete a collection.
    DeleteCollection(DeleteCollectionRequest),
    /// List collections.
    FindCollections(FindCollectionsRequest),

    // ==================== Collection ====================
    /// Insert one document.
    InsertOne(InsertOneRequest),
    /// Insert several documents.
    InsertMany(InsertManyRequest),
    /// Page of matching documents.
    Find(FindRequest),
    /// First matching document.
    FindOne(FindOneRequest),
    /// Count matching documents.
    CountDocuments(CountRequest),
    /// Update one document.
    UpdateOne(UpdateOneRequest),
    /// Delete one document.
    DeleteOne(DeleteOneRequest),
    /// Delete matching documents, one batch per call.
    DeleteMany(DeleteManyRequest),
}

/// Every accepted command name, aliases included.
pub const COMMAND_NAMES: &[&str] = &[
    "createNamespace",
    "dropNamespace",
    "findNamespaces",
    "findVectorProviders",
    "findEmbeddingProviders",
    "findRerankingProviders",
    "createCollection",
    "deleteCollection",
    "findCollections",
    "insertOne",
    "insertMany",
    "find",
    "findOne",
    "countDocuments",
    "updateOne",
    "deleteOne",
    "deleteMany",
];

impl Command {
    /// Parse a request body.
    pub fn parse(body: &str) -> Result<Command> {
        let value: JsonValue = serde_json::from_str(body).map_err(|e| Error::InvalidRequest {
            reason: format!("body is not valid JSON: {}", e),
        })?;
        Command::from_value(value)
    }

    /// Parse an already decoded request body.
    pub fn from_value(value: JsonValue) -> Result<Command> {
        let name = match &value {
            JsonValue::Object(members) if members.len() == 1 => {
                members.keys().next().cloned().unwrap_or_default()
            }
            JsonValue::Object(members) => {
                return Err(Error::InvalidRequest {
                    reason: format!("expected exactly one command, got {}", members.len()),
                })
            }
            _ => {
                return Err(Error::InvalidRequest {
                    reason: "body must be a JSON object".into(),
                })
            }
        };
        if !COMMAND_NAMES.contains(&name.as_str()) {
            return Err(Error::NoCommandMatched { name });
        }
        serde_json::from_value(value).map_err(|e| Error::CommandFieldInvalid {
            command: name,
            reason: e.to_string(),
        })
    }

    /// Canonical command name.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateNamespace(_) => "createNamespace",
            Command::DropNamespace(_) => "dropNamespace",
            Command::FindNamespaces(_) => "findNamespaces",
            Command::FindVectorProviders(_) => "findVectorProviders",
            Command::FindRerankingProviders(_) => "findRerankingProviders",
            Command::CreateCollection(_) => "createCollection",
            Command::DeleteCollection(_) => "deleteCollection",
            Command::FindCollections(_) => "findCollections",
            Command::InsertOne(_) => "insertOne",
            Command::InsertMany(_) => "insertMany",
            Command::Find(_) => "find",
            Command::FindOne(_) => "findOne",
            Command::CountDocuments(_) => "countDocuments",
            Command::UpdateOne(_) => "updateOne",
            Command::DeleteOne(_) => "deleteOne",
            Command::DeleteMany(_) => "deleteMany",
        }
    }

    /// Scope the command needs from the request context.
    pub fn scope(&self) -> Scope {
        match self {
            Command::CreateNamespace(_)
            | Command::DropNamespace(_)
            | Command::FindNamespaces(_)
            | Command::FindVectorProviders(_)
            | Command::FindRerankingProviders(_) => Scope::Tenant,
            Command::CreateCollection(_)
            | Command::DeleteCollection(_)
            | Command::FindCollections(_) => Scope::Namespace,
            _ => Scope::Collection,
        }
    }
}
