//! Collection lifecycle and tenant limits.

use crate::common::*;

#[test]
fn identical_create_twice_makes_one_table() {
    let db = TestDb::new();
    let options = json!({"vector": {"dimension": 4, "metric": "dot_product"}});
    db.create_collection("items", options.clone());
    db.create_collection("items", options);

    let response = db.ok(&db.namespace_ctx(), json!({"findCollections": {}}));
    assert_eq!(response["status"]["collections"], json!(["items"]));
}

#[test]
fn different_options_conflict_and_leave_collection_unchanged() {
    let db = TestDb::new();
    db.create_collection("items", json!({"vector": {"dimension": 4, "metric": "cosine"}}));
    let code = db.fail(
        &db.namespace_ctx(),
        json!({"createCollection": {"name": "items", "options": {"vector": {"dimension": 8, "metric": "cosine"}}}}),
    );
    assert_eq!(code, "EXISTING_COLLECTION_DIFFERENT_SETTINGS");

    let response = db.ok(
        &db.namespace_ctx(),
        json!({"findCollections": {"options": {"explain": true}}}),
    );
    assert_eq!(
        response["status"]["collections"][0]["options"]["vector"]["dimension"],
        json!(4)
    );
}

#[test]
fn collection_limit_reports_counts() {
    let db = TestDb::new();
    for name in ["c1", "c2", "c3"] {
        db.create_collection(name, json!({}));
    }
    let response = db.run(&db.namespace_ctx(), json!({"createCollection": {"name": "c4"}}));
    assert_eq!(response["errors"][0]["errorCode"], json!("TOO_MANY_COLLECTIONS"));
    assert_eq!(response["errors"][0]["exceptionClass"], json!("ResourceLimitError"));
    assert!(response["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("3 of 3"));

    // Existing collections are still accepted.
    db.create_collection("c2", json!({}));

    // Dropping frees a slot.
    db.ok(&db.namespace_ctx(), json!({"deleteCollection": {"name": "c1"}}));
    db.create_collection("c4", json!({}));
}

#[test]
fn limits_are_per_tenant() {
    let db = TestDb::new();
    for name in ["c1", "c2", "c3"] {
        db.create_collection(name, json!({}));
    }
    let other = RequestContext::new(TenantId::new("tenant2").unwrap());
    db.ok(&other, json!({"createNamespace": {"name": "ks"}}));
    let other_ns = other.with_namespace(NamespaceName::new("ks").unwrap());
    db.ok(&other_ns, json!({"createCollection": {"name": "c1"}}));
}

#[test]
fn delete_missing_collection_succeeds() {
    let db = TestDb::new();
    db.ok(&db.namespace_ctx(), json!({"deleteCollection": {"name": "ghost"}}));
}

#[test]
fn invalid_options_rejected() {
    let db = TestDb::new();
    let code = db.fail(
        &db.namespace_ctx(),
        json!({"createCollection": {"name": "v", "options": {"vector": {"dimension": 0, "metric": "cosine"}}}}),
    );
    assert_eq!(code, "INVALID_COLLECTION_OPTIONS");
    let code = db.fail(
        &db.namespace_ctx(),
        json!({"createCollection": {"name": "v", "options": {"colour": "red"}}}),
    );
    assert_eq!(code, "COMMAND_FIELD_INVALID");
}

#[test]
fn commands_on_missing_collection() {
    let db = TestDb::new();
    let code = db.fail(&db.collection_ctx("ghost"), json!({"find": {}}));
    assert_eq!(code, "COLLECTION_NOT_EXIST");
}
