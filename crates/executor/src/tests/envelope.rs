//! End-to-end tests through `execute_json`: raw body in, envelope out.

use serde_json::{json, Value as JsonValue};

use super::{collection_ctx, create_test_executor, executor_with_namespace, namespace_ctx, tenant_ctx};
use crate::{Executor, RequestContext};

fn run(executor: &Executor, ctx: &RequestContext, body: JsonValue) -> JsonValue {
    executor.execute_json(ctx, &body.to_string()).to_json()
}

fn error_code(response: &JsonValue) -> &str {
    response["errors"][0]["errorCode"].as_str().unwrap_or("")
}

#[test]
fn test_oversized_body_rejected_before_parsing() {
    let (_, executor) = create_test_executor();
    // Not even JSON: size must still be the reported failure.
    let body = "x".repeat(5000);
    let response = executor.execute_json(&tenant_ctx(), &body);
    assert_eq!(response.error_code(), Some("REQUEST_TOO_LARGE"));

    let padded = json!({"frobnicate": {"pad": "y".repeat(5000)}}).to_string();
    let response = executor.execute_json(&tenant_ctx(), &padded);
    assert_eq!(response.error_code(), Some("REQUEST_TOO_LARGE"));
    assert_eq!(response.errors.unwrap()[0].exception_class, "ResourceLimitError");
}

#[test]
fn test_unknown_command_envelope() {
    let (_, executor) = create_test_executor();
    let response = run(&executor, &tenant_ctx(), json!({"frobnicate": {}}));
    assert_eq!(error_code(&response), "NO_COMMAND_MATCHED");
    assert!(response.get("status").is_none());
}

#[test]
fn test_namespace_lifecycle() {
    let (_, executor) = executor_with_namespace();
    let response = run(&executor, &tenant_ctx(), json!({"findNamespaces": {}}));
    assert_eq!(response["status"]["namespaces"], json!(["ks"]));

    let response = run(&executor, &tenant_ctx(), json!({"dropNamespace": {"name": "ks"}}));
    assert_eq!(response["status"]["ok"], json!(1));
    let response = run(&executor, &tenant_ctx(), json!({"findNamespaces": {}}));
    assert_eq!(response["status"]["namespaces"], json!([]));
}

#[test]
fn test_identical_create_collection_twice() {
    let (_, executor) = executor_with_namespace();
    let body = json!({"createCollection": {"name": "users", "options": {"vector": {"dimension": 3, "metric": "cosine"}}}});
    assert_eq!(run(&executor, &namespace_ctx(), body.clone())["status"]["ok"], json!(1));
    assert_eq!(run(&executor, &namespace_ctx(), body)["status"]["ok"], json!(1));
    let response = run(&executor, &namespace_ctx(), json!({"findCollections": {}}));
    assert_eq!(response["status"]["collections"], json!(["users"]));
}

#[test]
fn test_create_collection_conflict() {
    let (_, executor) = executor_with_namespace();
    run(&executor, &namespace_ctx(), json!({"createCollection": {"name": "users"}}));
    let response = run(
        &executor,
        &namespace_ctx(),
        json!({"createCollection": {"name": "users", "options": {"lexical": {"enabled": true, "analyzer": "standard"}}}}),
    );
    assert_eq!(error_code(&response), "EXISTING_COLLECTION_DIFFERENT_SETTINGS");
    assert_eq!(response["errors"][0]["exceptionClass"], json!("ConflictError"));

    let response = run(&executor, &namespace_ctx(), json!({"findCollections": {"options": {"explain": true}}}));
    assert!(response["status"]["collections"][0]["options"].get("lexical").is_none());
}

#[test]
fn test_collection_cap() {
    let (_, executor) = executor_with_namespace();
    for name in ["a", "b", "c"] {
        let response = run(&executor, &namespace_ctx(), json!({"createCollection": {"name": name}}));
        assert!(response.get("errors").is_none(), "{}", response);
    }
    let response = run(&executor, &namespace_ctx(), json!({"createCollection": {"name": "d"}}));
    assert_eq!(error_code(&response), "TOO_MANY_COLLECTIONS");
    let message = response["errors"][0]["message"].as_str().unwrap();
    assert!(message.contains("3 of 3"), "{}", message);

    // Re-creating an existing one is not a new collection.
    let response = run(&executor, &namespace_ctx(), json!({"createCollection": {"name": "a"}}));
    assert_eq!(response["status"]["ok"], json!(1));
}

#[test]
fn test_missing_scope() {
    let (_, executor) = executor_with_namespace();
    let response = run(&executor, &tenant_ctx(), json!({"createCollection": {"name": "users"}}));
    assert_eq!(error_code(&response), "INVALID_REQUEST");
    let response = run(&executor, &namespace_ctx(), json!({"find": {}}));
    assert_eq!(error_code(&response), "INVALID_REQUEST");
}

#[test]
fn test_document_round_trip() {
    let (_, executor) = executor_with_namespace();
    run(&executor, &namespace_ctx(), json!({"createCollection": {"name": "users"}}));
    let ctx = collection_ctx("users");

    let response = run(&executor, &ctx, json!({"insertOne": {"document": {"_id": "u1", "name": "Ada", "age": 36}}}));
    assert_eq!(response["status"]["insertedIds"], json!(["u1"]));

    let response = run(&executor, &ctx, json!({"findOne": {"filter": {"name": "Ada"}, "projection": {"age": 1}}}));
    assert_eq!(response["data"]["document"], json!({"_id": "u1", "age": 36}));

    let response = run(&executor, &ctx, json!({"updateOne": {"filter": {"_id": "u1"}, "update": {"$inc": {"age": 1}}}}));
    assert_eq!(response["status"], json!({"matchedCount": 1, "modifiedCount": 1}));

    let response = run(&executor, &ctx, json!({"countDocuments": {"filter": {"age": {"$gt": 36}}}}));
    assert_eq!(response["status"]["count"], json!(1));

    let response = run(&executor, &ctx, json!({"deleteOne": {"filter": {"_id": "u1"}}}));
    assert_eq!(response["status"]["deletedCount"], json!(1));
    let response = run(&executor, &ctx, json!({"findOne": {"filter": {"_id": "u1"}}}));
    assert_eq!(response["data"]["document"], JsonValue::Null);
}

#[test]
fn test_providers() {
    let (_, executor) = create_test_executor();
    let response = run(&executor, &tenant_ctx(), json!({"findEmbeddingProviders": {}}));
    assert!(response["status"]["vectorProviders"]["openai"].is_object());
    let response = run(&executor, &tenant_ctx(), json!({"findRerankingProviders": {}}));
    assert!(response["status"]["rerankingProviders"]["nvidia"].is_object());
}

#[test]
fn test_outage_then_recovery() {
    let (cluster, executor) = executor_with_namespace();
    run(&executor, &namespace_ctx(), json!({"createCollection": {"name": "users"}}));
    let ctx = collection_ctx("users");

    cluster.fail_all_nodes();
    let response = run(&executor, &ctx, json!({"find": {}}));
    assert_eq!(error_code(&response), "SERVER_UNAVAILABLE");
    assert_eq!(response["errors"][0]["exceptionClass"], json!("UnavailableError"));

    cluster.restore();
    let response = run(&executor, &ctx, json!({"insertOne": {"document": {"_id": 1}}}));
    assert_eq!(response["status"]["insertedIds"], json!([1]));
}
