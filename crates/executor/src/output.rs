//! Command results and the response envelope.
//!
//! Each [`Command`](crate::Command) produces one [`Output`] variant.
//! [`Output::into_response`] renders it into the envelope clients receive:
//!
//! ```text
//! { "status"?: {...}, "data"?: {...}, "errors"?: [{ "message", "errorCode", "exceptionClass" }] }
//! ```
//!
//! Status carries acknowledgements and counters, data carries documents.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use tessera_engine::{CountResult, DeleteResult, FindResult, InsertResult, UpdateResult};

use crate::error::{Error, ErrorEntry};

/// Successful command results.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Acknowledged with no payload (`{"ok": 1}`)
    Ok,
    /// Namespace names
    Namespaces(Vec<String>),
    /// Collection names or descriptions
    Collections(Vec<JsonValue>),
    /// Insert outcome
    Inserted(InsertResult),
    /// One page of documents
    Documents(FindResult),
    /// Single document lookup
    Document(Option<JsonValue>),
    /// Count outcome
    Count(CountResult),
    /// Update outcome
    Updated(UpdateResult),
    /// Delete outcome
    Deleted(DeleteResult),
    /// Static provider catalog under the given status key
    Providers {
        /// Status member name
        key: &'static str,
        /// Catalog
        providers: JsonValue,
    },
}

/// Response envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Acknowledgements and counters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Map<String, JsonValue>>,
    /// Returned documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, JsonValue>>,
    /// Failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorEntry>>,
}

impl CommandResponse {
    /// Envelope carrying a single error.
    pub fn from_error(error: &Error) -> Self {
        CommandResponse {
            errors: Some(vec![error.to_entry()]),
            ..Default::default()
        }
    }

    /// First error code, if any.
    pub fn error_code(&self) -> Option<&str> {
        self.errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|e| e.error_code.as_str())
    }

    /// Serialize to a JSON value.
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

fn object(value: JsonValue) -> Option<Map<String, JsonValue>> {
    match value {
        JsonValue::Object(map) => Some(map),
        _ => None,
    }
}

impl Output {
    /// Render into the response envelope.
    pub fn into_response(self) -> CommandResponse {
        match self {
            Output::Ok => status(json!({"ok": 1})),
            Output::Namespaces(names) => status(json!({"namespaces": names})),
            Output::Collections(collections) => status(json!({"collections": collections})),
            Output::Inserted(result) => {
                let mut response = status(json!({"insertedIds": result.inserted_ids}));
                if !result.failures.is_empty() {
                    response.errors = Some(
                        result
                            .failures
                            .iter()
                            .map(|(position, e)| {
                                let mut entry = Error::from(e.clone()).to_entry();
                                entry.message = format!("document {}: {}", position, entry.message);
                                entry
                            })
                            .collect(),
                    );
                }
                response
            }
            Output::Documents(result) => CommandResponse {
                data: object(json!({
                    "documents": result.documents,
                    "nextPageState": result.next_page_state,
                })),
                ..Default::default()
            },
            Output::Document(document) => CommandResponse {
                data: object(json!({"document": document})),
                ..Default::default()
            },
            Output::Count(result) => {
                let mut body = json!({"count": result.count});
                if result.more_data {
                    body["moreData"] = json!(true);
                }
                status(body)
            }
            Output::Updated(result) => {
                let mut body = json!({
                    "matchedCount": result.matched_count,
                    "modifiedCount": result.modified_count,
                });
                if let Some(id) = result.upserted_id {
                    body["upsertedId"] = id;
                }
                status(body)
            }
            Output::Deleted(result) => {
                let mut body = json!({"deletedCount": result.deleted_count});
                if result.more_data {
                    body["moreData"] = json!(true);
                }
                status(body)
            }
            Output::Providers { key, providers } => {
                let mut body = Map::new();
                body.insert(key.to_string(), providers);
                CommandResponse {
                    status: Some(body),
                    ..Default::default()
                }
            }
        }
    }
}

fn status(body: JsonValue) -> CommandResponse {
    CommandResponse {
        status: object(body),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_engine::Error as EngineError;

    #[test]
    fn test_ok_status() {
        assert_eq!(Output::Ok.into_response().to_json(), json!({"status": {"ok": 1}}));
    }

    #[test]
    fn test_documents_go_to_data() {
        let response = Output::Documents(FindResult {
            documents: vec![json!({"_id": 1})],
            next_page_state: None,
        })
        .into_response();
        assert_eq!(
            response.to_json(),
            json!({"data": {"documents": [{"_id": 1}], "nextPageState": null}})
        );
    }

    #[test]
    fn test_partial_insert_reports_both() {
        let response = Output::Inserted(InsertResult {
            inserted_ids: vec![json!(1)],
            failures: vec![(1, EngineError::DocumentExists { id: "1".into() })],
        })
        .into_response();
        let json = response.to_json();
        assert_eq!(json["status"]["insertedIds"], json!([1]));
        assert_eq!(response.error_code(), Some("DOCUMENT_ALREADY_EXISTS"));
    }

    #[test]
    fn test_update_counts() {
        let response = Output::Updated(UpdateResult {
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(json!("new")),
        })
        .into_response();
        assert_eq!(
            response.to_json(),
            json!({"status": {"matchedCount": 0, "modifiedCount": 0, "upsertedId": "new"}})
        );
    }

    #[test]
    fn test_error_envelope() {
        let response = CommandResponse::from_error(&Error::NoCommandMatched { name: "x".into() });
        let json = response.to_json();
        assert!(json.get("status").is_none());
        assert_eq!(json["errors"][0]["errorCode"], json!("NO_COMMAND_MATCHED"));
    }
}
