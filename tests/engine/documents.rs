//! Document commands: filters, projections, sorting, counting, updates.

use crate::common::*;

fn seeded() -> (TestDb, RequestContext) {
    let db = TestDb::new();
    db.create_collection("people", json!({"indexing": {"deny": ["notes"]}}));
    let ctx = db.collection_ctx("people");
    db.ok(
        &ctx,
        json!({"insertMany": {"documents": [
            {"_id": "ada", "age": 36, "tags": ["math", "poetry"], "address": {"city": "London"}},
            {"_id": "alan", "age": 41, "tags": ["math"], "address": {"city": "Wilmslow"}},
            {"_id": "grace", "age": 85, "tags": ["navy"], "address": {"city": "Arlington"}},
            {"_id": "linus", "age": 54, "retired": false},
            {"_id": "barbara", "age": 82, "retired": true, "notes": "anything"}
        ]}}),
    );
    (db, ctx)
}

fn find_ids(db: &TestDb, ctx: &RequestContext, body: JsonValue) -> Vec<JsonValue> {
    let response = db.ok(ctx, json!({ "find": body }));
    ids(&response["data"]["documents"])
}

#[test]
fn equality_range_and_membership_filters() {
    let (db, ctx) = seeded();
    let mut by_tag = find_ids(&db, &ctx, json!({"filter": {"tags": "math"}}));
    by_tag.sort_by_key(|v| v.to_string());
    assert_eq!(by_tag, vec![json!("ada"), json!("alan")]);

    let mut older = find_ids(&db, &ctx, json!({"filter": {"age": {"$gte": 80}}}));
    older.sort_by_key(|v| v.to_string());
    assert_eq!(older, vec![json!("barbara"), json!("grace")]);

    let nested = find_ids(&db, &ctx, json!({"filter": {"address.city": "London"}}));
    assert_eq!(nested, vec![json!("ada")]);

    let mut either = find_ids(
        &db,
        &ctx,
        json!({"filter": {"$or": [{"retired": true}, {"age": {"$lt": 40}}]}}),
    );
    either.sort_by_key(|v| v.to_string());
    assert_eq!(either, vec![json!("ada"), json!("barbara")]);

    let mut not_math = find_ids(&db, &ctx, json!({"filter": {"tags": {"$exists": true}, "age": {"$ne": 36}}}));
    not_math.sort_by_key(|v| v.to_string());
    assert_eq!(not_math, vec![json!("alan"), json!("grace")]);
}

#[test]
fn filter_on_denied_path() {
    let (db, ctx) = seeded();
    assert_eq!(db.fail(&ctx, json!({"find": {"filter": {"notes": "x"}}})), "UNINDEXED_FILTER_PATH");
    assert_eq!(db.fail(&ctx, json!({"find": {"sort": {"notes": 1}}})), "UNINDEXED_SORT_PATH");
}

#[test]
fn malformed_filters_and_sorts() {
    let (db, ctx) = seeded();
    assert_eq!(db.fail(&ctx, json!({"find": {"filter": {"age": {"$near": 1}}}})), "INVALID_FILTER_EXPRESSION");
    assert_eq!(db.fail(&ctx, json!({"find": {"sort": {"age": 2}}})), "INVALID_SORT_CLAUSE");
    assert_eq!(db.fail(&ctx, json!({"find": {"options": {"skip": 1}}})), "INVALID_REQUEST");
}

#[test]
fn field_sort_with_skip_and_limit() {
    let (db, ctx) = seeded();
    let sorted = find_ids(
        &db,
        &ctx,
        json!({"sort": {"age": -1}, "options": {"skip": 1, "limit": 3}}),
    );
    assert_eq!(sorted, vec![json!("barbara"), json!("linus"), json!("alan")]);
}

#[test]
fn projection_include_and_exclude() {
    let (db, ctx) = seeded();
    let response = db.ok(
        &ctx,
        json!({"findOne": {"filter": {"_id": "ada"}, "projection": {"address.city": 1}}}),
    );
    assert_eq!(
        response["data"]["document"],
        json!({"_id": "ada", "address": {"city": "London"}})
    );
    let response = db.ok(
        &ctx,
        json!({"findOne": {"filter": {"_id": "ada"}, "projection": {"tags": 0, "address": 0, "_id": 0}}}),
    );
    assert_eq!(response["data"]["document"], json!({"age": 36}));
}

#[test]
fn count_caps_with_more_data() {
    let db = TestDb::new();
    db.create_collection("many", json!({}));
    let ctx = db.collection_ctx("many");
    for batch in 0..3 {
        let documents: Vec<JsonValue> = (0..10).map(|i| json!({"_id": batch * 10 + i, "k": 1})).collect();
        db.ok(&ctx, json!({"insertMany": {"documents": documents}}));
    }
    let response = db.ok(&ctx, json!({"countDocuments": {"filter": {"k": 1}}}));
    assert_eq!(response["status"], json!({"count": 20, "moreData": true}));

    let response = db.ok(&ctx, json!({"countDocuments": {"filter": {"_id": {"$in": [1, 2, 3]}}}}));
    assert_eq!(response["status"], json!({"count": 3}));
}

#[test]
fn update_operators() {
    let (db, ctx) = seeded();
    db.ok(
        &ctx,
        json!({"updateOne": {"filter": {"_id": "alan"}, "update": {
            "$set": {"address.country": "UK"},
            "$push": {"tags": "computing"},
            "$unset": {"age": ""}
        }}}),
    );
    let response = db.ok(&ctx, json!({"findOne": {"filter": {"_id": "alan"}}}));
    assert_eq!(
        response["data"]["document"],
        json!({"_id": "alan", "tags": ["math", "computing"], "address": {"city": "Wilmslow", "country": "UK"}})
    );

    // Shredded columns follow the update.
    let found = find_ids(&db, &ctx, json!({"filter": {"address.country": "UK"}}));
    assert_eq!(found, vec![json!("alan")]);
}

#[test]
fn unsupported_updates() {
    let (db, ctx) = seeded();
    for update in [
        json!({"age": 1}),
        json!({"$set": {"_id": "x"}}),
        json!({"$frob": {"a": 1}}),
        json!({"$set": {"a": 1}, "$unset": {"a": ""}}),
    ] {
        let code = db.fail(&ctx, json!({"updateOne": {"filter": {"_id": "ada"}, "update": update}}));
        assert_eq!(code, "UNSUPPORTED_UPDATE_OPERATION", "{}", update);
    }
}

#[test]
fn update_with_sort_targets_first_in_order() {
    let (db, ctx) = seeded();
    db.ok(
        &ctx,
        json!({"updateOne": {"filter": {}, "sort": {"age": -1}, "update": {"$set": {"oldest": true}}}}),
    );
    let found = find_ids(&db, &ctx, json!({"filter": {"oldest": true}}));
    assert_eq!(found, vec![json!("grace")]);
}

#[test]
fn insert_many_unordered_reports_failures() {
    let (db, ctx) = seeded();
    let response = db.run(
        &ctx,
        json!({"insertMany": {"documents": [{"_id": "ada"}, {"_id": "new"}, {"_id": {"bad": 1}}], "options": {"ordered": false}}}),
    );
    assert_eq!(response["status"]["insertedIds"], json!(["new"]));
    let codes: Vec<&str> = response["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["errorCode"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["DOCUMENT_ALREADY_EXISTS", "INVALID_REQUEST"]);
}

#[test]
fn generated_ids_are_returned() {
    let (db, ctx) = seeded();
    let response = db.ok(&ctx, json!({"insertOne": {"document": {"name": "anon"}}}));
    let id = response["status"]["insertedIds"][0].clone();
    assert!(id.is_string());
    let found = db.ok(&ctx, json!({"findOne": {"filter": {"_id": id}}}));
    assert_eq!(found["data"]["document"]["name"], json!("anon"));
}

#[test]
fn oversized_document_rejected() {
    let (db, ctx) = seeded();
    let code = db.fail(&ctx, json!({"insertOne": {"document": {"blob": "z".repeat(2000)}}}));
    assert_eq!(code, "DOCUMENT_TOO_LARGE");
}

#[test]
fn oversized_body_checked_before_shape() {
    let (db, ctx) = seeded();
    let response = db.executor.execute_json(&ctx, &format!("{{\"notACommand\": \"{}\"", "q".repeat(5000)));
    assert_eq!(response.error_code(), Some("REQUEST_TOO_LARGE"));
}
