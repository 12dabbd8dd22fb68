//! Store outages: sessions are dropped and rebuilt, quotas re-read.

use crate::common::*;

#[test]
fn outage_reports_unavailable_until_restored() {
    let db = TestDb::new();
    db.create_collection("users", json!({}));
    let ctx = db.collection_ctx("users");
    db.ok(&ctx, json!({"insertOne": {"document": {"_id": "u1", "name": "Ada"}}}));

    db.cluster.fail_all_nodes();
    assert_eq!(db.fail(&ctx, json!({"find": {}})), "SERVER_UNAVAILABLE");
    // No live session now; reconnecting fails the same way.
    assert_eq!(
        db.fail(&ctx, json!({"insertOne": {"document": {"_id": "u2"}}})),
        "SERVER_UNAVAILABLE"
    );
    assert_eq!(db.fail(&db.tenant_ctx(), json!({"findNamespaces": {}})), "SERVER_UNAVAILABLE");

    db.cluster.restore();
    let response = db.ok(&ctx, json!({"findOne": {"filter": {"_id": "u1"}}}));
    assert_eq!(response["data"]["document"]["name"], json!("Ada"));
    let response = db.ok(&ctx, json!({"countDocuments": {}}));
    assert_eq!(response["status"]["count"], json!(1));
}

#[test]
fn recovery_opens_a_new_session() {
    let db = TestDb::new();
    db.create_collection("users", json!({}));
    let ctx = db.collection_ctx("users");
    let before = db.cluster.connect_count();

    db.cluster.fail_all_nodes();
    db.fail(&ctx, json!({"find": {}}));
    db.cluster.restore();
    db.ok(&ctx, json!({"find": {}}));
    db.ok(&ctx, json!({"find": {}}));

    assert_eq!(db.cluster.connect_count(), before + 1);
}

#[test]
fn quotas_are_reseeded_after_eviction() {
    let db = TestDb::new();
    db.create_collection("a", json!({}));
    db.create_collection("b", json!({}));
    let engine = db.executor.engine();
    assert_eq!(engine.limiter().usage(&db.tenant).map(|u| u.collections), Some(2));

    db.cluster.fail_all_nodes();
    db.fail(&db.collection_ctx("a"), json!({"find": {}}));
    assert!(engine.limiter().usage(&db.tenant).is_none());
    db.cluster.restore();

    db.create_collection("c", json!({}));
    assert_eq!(engine.limiter().usage(&db.tenant).map(|u| u.collections), Some(3));
    let code = db.fail(&db.namespace_ctx(), json!({"createCollection": {"name": "d"}}));
    assert_eq!(code, "TOO_MANY_COLLECTIONS");
}

#[test]
fn failed_create_during_outage_holds_no_quota() {
    let db = TestDb::new();
    db.create_collection("a", json!({}));
    db.cluster.fail_all_nodes();
    let code = db.fail(&db.namespace_ctx(), json!({"createCollection": {"name": "b"}}));
    assert_eq!(code, "SERVER_UNAVAILABLE");
    db.cluster.restore();

    db.create_collection("b", json!({}));
    db.create_collection("c", json!({}));
    let response = db.ok(&db.namespace_ctx(), json!({"findCollections": {}}));
    assert_eq!(response["status"]["collections"].as_array().map(Vec::len), Some(3));
}
