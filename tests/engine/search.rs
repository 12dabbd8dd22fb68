//! Vector, lexical and hybrid sorts.

use crate::common::*;

fn lexical_db() -> (TestDb, RequestContext) {
    let db = TestDb::new();
    db.create_collection("texts", json!({"lexical": {"enabled": true, "analyzer": "standard"}}));
    let ctx = db.collection_ctx("texts");
    db.ok(
        &ctx,
        json!({"insertMany": {"documents": [
            {"_id": "t1", "$lexical": "monkey banana"},
            {"_id": "t2", "$lexical": "monkey"},
            {"_id": "t3", "$lexical": "biking fun"},
            {"_id": "t4", "$lexical": "banana"},
            {"_id": "t5", "$lexical": "fun"}
        ]}}),
    );
    (db, ctx)
}

#[test]
fn lexical_sort_returns_only_matching_documents_by_relevance() {
    let (db, ctx) = lexical_db();
    let response = db.ok(&ctx, json!({"find": {"sort": {"$lexical": "banana"}, "projection": {"*": 1}}}));
    let documents = &response["data"]["documents"];
    assert_eq!(ids(documents), vec![json!("t4"), json!("t1")]);
    assert_eq!(documents[0]["$lexical"], json!("banana"));
    assert_eq!(documents[1]["$lexical"], json!("monkey banana"));
}

#[test]
fn lexical_scores_when_requested() {
    let (db, ctx) = lexical_db();
    let response = db.ok(
        &ctx,
        json!({"find": {"sort": {"$lexical": "fun"}, "options": {"includeScores": true}}}),
    );
    let documents = response["data"]["documents"].as_array().unwrap().clone();
    assert_eq!(documents.len(), 2);
    for doc in &documents {
        assert!(doc["$scores"]["$lexical"].as_f64().unwrap() > 0.0);
    }
}

#[test]
fn lexical_requires_enabled_collection() {
    let db = TestDb::new();
    db.create_collection("plain", json!({}));
    let code = db.fail(&db.collection_ctx("plain"), json!({"find": {"sort": {"$lexical": "x"}}}));
    assert_eq!(code, "LEXICAL_NOT_ENABLED");
    let code = db.fail(
        &db.collection_ctx("plain"),
        json!({"insertOne": {"document": {"$lexical": "x"}}}),
    );
    assert_eq!(code, "LEXICAL_NOT_ENABLED");
}

fn hybrid_db() -> (TestDb, RequestContext) {
    let db = TestDb::new();
    db.create_collection(
        "mixed",
        json!({
            "vector": {"dimension": 2, "metric": "cosine"},
            "lexical": {"enabled": true, "analyzer": "standard"}
        }),
    );
    let ctx = db.collection_ctx("mixed");
    db.ok(
        &ctx,
        json!({"insertMany": {"documents": [
            {"_id": "a", "$vector": [1.0, 0.0], "$lexical": "red apple"},
            {"_id": "b", "$vector": [0.9, 0.1], "$lexical": "green pear"},
            {"_id": "c", "$vector": [0.0, 1.0], "$lexical": "apple pie apple"},
            {"_id": "d", "$vector": [0.1, 0.9], "$lexical": "nothing here"}
        ]}}),
    );
    (db, ctx)
}

#[test]
fn vector_dimension_checked() {
    let (db, ctx) = hybrid_db();
    let code = db.fail(&ctx, json!({"find": {"sort": {"$vector": [1.0, 0.0, 0.0]}}}));
    assert_eq!(code, "VECTOR_DIMENSION_MISMATCH");
    let code = db.fail(&ctx, json!({"insertOne": {"document": {"$vector": [1.0]}}}));
    assert_eq!(code, "VECTOR_DIMENSION_MISMATCH");
}

#[test]
fn ranked_sorts_are_single_page() {
    let (db, ctx) = hybrid_db();
    let response = db.ok(&ctx, json!({"find": {"sort": {"$vector": [1.0, 0.0]}, "options": {"limit": 2}}}));
    assert_eq!(ids(&response["data"]["documents"]), vec![json!("a"), json!("b")]);
    assert_eq!(response["data"]["nextPageState"], JsonValue::Null);

    let code = db.fail(
        &ctx,
        json!({"find": {"sort": {"$vector": [1.0, 0.0]}, "options": {"pageState": "abc"}}}),
    );
    assert_eq!(code, "INVALID_REQUEST");
    let code = db.fail(
        &ctx,
        json!({"find": {"sort": {"$vector": [1.0, 0.0]}, "options": {"limit": 51}}}),
    );
    assert_eq!(code, "INVALID_REQUEST");
}

#[test]
fn vector_sort_with_filter() {
    let (db, ctx) = hybrid_db();
    db.ok(
        &ctx,
        json!({"updateOne": {"filter": {"_id": "a"}, "update": {"$set": {"hidden": true}}}}),
    );
    let response = db.ok(
        &ctx,
        json!({"find": {"filter": {"hidden": {"$ne": true}}, "sort": {"$vector": [1.0, 0.0]}, "options": {"limit": 1}}}),
    );
    assert_eq!(ids(&response["data"]["documents"]), vec![json!("b")]);
}

#[test]
fn hybrid_sort_fuses_both_rankings() {
    let (db, ctx) = hybrid_db();
    let response = db.ok(
        &ctx,
        json!({"find": {
            "sort": {"$vector": [1.0, 0.0], "$lexical": "apple"},
            "options": {"includeScores": true, "includeSimilarity": true}
        }}),
    );
    let documents = &response["data"]["documents"];
    let order = ids(documents);
    assert_eq!(order.len(), 4);
    assert_eq!(&order[..2], &[json!("a"), json!("c")]);

    let top = &documents[0];
    assert!(top["$scores"]["$hybrid"].as_f64().unwrap() > documents[1]["$scores"]["$hybrid"].as_f64().unwrap());
    assert!(top["$scores"]["$vector"].is_number());
    assert!(top["$scores"]["$lexical"].is_number());
    assert!(top["$similarity"].is_number());
    // "b" only ranked by vector.
    let b = documents
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["_id"] == json!("b"))
        .unwrap();
    assert!(b["$scores"].get("$lexical").is_none());
}
