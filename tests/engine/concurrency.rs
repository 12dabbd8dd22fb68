//! Concurrent commands against one document or collection.

use std::sync::Barrier;
use std::thread;

use crate::common::*;

#[test]
fn concurrent_update_and_delete_never_resurrect() {
    for round in 0..25 {
        let db = TestDb::new();
        db.create_collection("docs", json!({}));
        let ctx = db.collection_ctx("docs");
        db.ok(&ctx, json!({"insertOne": {"document": {"_id": "d", "n": 0}}}));

        let barrier = Barrier::new(2);
        let (update, delete) = thread::scope(|s| {
            let u = s.spawn(|| {
                barrier.wait();
                db.run(&ctx, json!({"updateOne": {"filter": {"_id": "d"}, "update": {"$inc": {"n": 1}}}}))
            });
            let d = s.spawn(|| {
                barrier.wait();
                db.run(&ctx, json!({"deleteOne": {"filter": {"_id": "d"}}}))
            });
            (u.join().unwrap(), d.join().unwrap())
        });

        assert_eq!(delete["status"]["deletedCount"], json!(1), "round {}", round);
        let matched = update["status"]["matchedCount"].as_u64().unwrap();
        let modified = update["status"]["modifiedCount"].as_u64().unwrap();
        assert!(matched <= 1 && modified <= matched, "round {}: {}", round, update);

        let found = db.ok(&ctx, json!({"findOne": {"filter": {"_id": "d"}}}));
        assert_eq!(found["data"]["document"], JsonValue::Null, "round {}", round);
    }
}

#[test]
fn concurrent_increments_are_never_lost() {
    let db = TestDb::new();
    db.create_collection("docs", json!({}));
    let ctx = db.collection_ctx("docs");
    db.ok(&ctx, json!({"insertOne": {"document": {"_id": "counter", "n": 0}}}));

    let threads = 4;
    let per_thread = 10;
    let barrier = Barrier::new(threads);
    let applied: u64 = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    let mut applied = 0;
                    for _ in 0..per_thread {
                        let response = db.run(
                            &ctx,
                            json!({"updateOne": {"filter": {"_id": "counter"}, "update": {"$inc": {"n": 1}}}}),
                        );
                        match response["errors"][0]["errorCode"].as_str() {
                            None => applied += response["status"]["modifiedCount"].as_u64().unwrap(),
                            Some(code) => assert_eq!(code, "CONCURRENCY_FAILURE"),
                        }
                    }
                    applied
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    let found = db.ok(&ctx, json!({"findOne": {"filter": {"_id": "counter"}}}));
    assert_eq!(found["data"]["document"]["n"], json!(applied));
}

#[test]
fn concurrent_identical_creates_all_succeed() {
    let db = TestDb::new();
    let barrier = Barrier::new(3);
    let responses: Vec<JsonValue> = thread::scope(|s| {
        let handles: Vec<_> = (0..3)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    db.run(
                        &db.namespace_ctx(),
                        json!({"createCollection": {"name": "shared", "options": {"lexical": {"enabled": true, "analyzer": "standard"}}}}),
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for response in &responses {
        assert_eq!(response["status"]["ok"], json!(1), "{}", response);
    }
    let listed = db.ok(&db.namespace_ctx(), json!({"findCollections": {}}));
    assert_eq!(listed["status"]["collections"], json!(["shared"]));

    // One collection's worth of quota was consumed.
    db.create_collection("a", json!({}));
    db.create_collection("b", json!({}));
}

#[test]
fn concurrent_distinct_creates_respect_the_cap() {
    let db = TestDb::new();
    let barrier = Barrier::new(6);
    let codes: Vec<Option<String>> = thread::scope(|s| {
        let handles: Vec<_> = (0..6)
            .map(|i| {
                let db = &db;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    let response = db.run(
                        &db.namespace_ctx(),
                        json!({"createCollection": {"name": format!("c{}", i)}}),
                    );
                    response["errors"][0]["errorCode"].as_str().map(str::to_string)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let created = codes.iter().filter(|c| c.is_none()).count();
    assert_eq!(created, 3);
    assert!(codes
        .iter()
        .flatten()
        .all(|code| code == "TOO_MANY_COLLECTIONS"));
}
