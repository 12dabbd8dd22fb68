//! Identifier types
//!
//! Tenants, namespaces and collections map onto store-level names (keyspaces
//! and tables), so they share the store's naming rules: 1 to 48 characters,
//! ASCII letters, digits and underscores only.
//!
//! Document identifiers are typed JSON scalars. They are persisted as a
//! prefixed storage key so that `"1"` and `1` never collide.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

/// Reserved document field holding the identifier.
pub const ID_FIELD: &str = "_id";
/// Reserved document field holding the embedding.
pub const VECTOR_FIELD: &str = "$vector";
/// Reserved document field holding the lexical text.
pub const LEXICAL_FIELD: &str = "$lexical";

const MAX_NAME_LEN: usize = 48;

/// Invalid tenant, namespace or collection name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} name '{name}': {reason}")]
pub struct NameError {
    /// Which kind of name was rejected
    pub kind: &'static str,
    /// The rejected name
    pub name: String,
    /// Why it was rejected
    pub reason: &'static str,
}

fn validate_name(kind: &'static str, name: &str) -> Result<(), NameError> {
    let fail = |reason| NameError {
        kind,
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(fail("must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(fail("must be at most 48 characters"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(fail("only letters, digits and underscores are allowed"));
    }
    Ok(())
}

macro_rules! store_name {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a name.
            pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
                let name = name.into();
                validate_name($kind, &name)?;
                Ok(Self(name))
            }

            /// Borrow the name.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = NameError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

store_name!(
    /// Tenant identifier: the isolation unit owning a session and quotas.
    TenantId,
    "tenant"
);

store_name!(
    /// Namespace (keyspace) inside a tenant database.
    NamespaceName,
    "namespace"
);

store_name!(
    /// Collection (table) inside a namespace.
    CollectionName,
    "collection"
);

// =============================================================================
// DocumentId
// =============================================================================

/// Rejected `_id` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentIdError {
    /// `_id` was an object, array or null
    #[error("document id must be a string, number or boolean, got {actual}")]
    UnsupportedType {
        /// JSON type name of the offending value
        actual: &'static str,
    },
    /// String id was empty
    #[error("document id must not be an empty string")]
    Empty,
    /// Stored key had an unknown prefix
    #[error("corrupt document key '{0}'")]
    CorruptKey(String),
}

/// Identifier of a document within a collection.
///
/// The inner string is the storage key: a one-letter type tag, a colon and
/// the canonical text of the value (`s:abc`, `n:42`, `b:true`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generate a fresh random identifier (UUID v4 string).
    pub fn generate() -> Self {
        DocumentId(format!("s:{}", uuid::Uuid::new_v4()))
    }

    /// Build an id from the JSON value of an `_id` field.
    pub fn from_json(value: &JsonValue) -> Result<Self, DocumentIdError> {
        match value {
            JsonValue::String(s) if s.is_empty() => Err(DocumentIdError::Empty),
            JsonValue::String(s) => Ok(DocumentId(format!("s:{}", s))),
            JsonValue::Number(n) => Ok(DocumentId(format!("n:{}", n))),
            JsonValue::Bool(b) => Ok(DocumentId(format!("b:{}", b))),
            other => Err(DocumentIdError::UnsupportedType {
                actual: json_type_name(other),
            }),
        }
    }

    /// Rebuild an id from its storage key.
    pub fn from_storage_key(key: &str) -> Result<Self, DocumentIdError> {
        match key.split_once(':') {
            Some(("s", _)) | Some(("n", _)) | Some(("b", _)) => Ok(DocumentId(key.to_string())),
            _ => Err(DocumentIdError::CorruptKey(key.to_string())),
        }
    }

    /// The storage key (type-tagged).
    pub fn storage_key(&self) -> &str {
        &self.0
    }

    /// The id as the JSON value clients see.
    pub fn to_json(&self) -> JsonValue {
        let (tag, text) = self.0.split_once(':').unwrap_or(("s", self.0.as_str()));
        match tag {
            "n" => serde_json::from_str::<serde_json::Number>(text)
                .map(JsonValue::Number)
                .unwrap_or_else(|_| JsonValue::String(text.to_string())),
            "b" => JsonValue::Bool(text == "true"),
            _ => JsonValue::String(text.to_string()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// JSON type name used in error messages.
pub fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
