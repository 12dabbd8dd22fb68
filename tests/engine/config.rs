//! Loading `tessera.toml` and running an engine from it.

use std::sync::Arc;

use tempfile::TempDir;

use crate::common::*;

#[test]
fn default_file_is_written_once_and_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(tessera::CONFIG_FILE_NAME);

    EngineConfig::write_default_if_missing(&path).unwrap();
    let loaded = EngineConfig::from_file(&path).unwrap();
    assert_eq!(loaded, EngineConfig::default());

    std::fs::write(&path, "max_conditional_attempts = 7\n").unwrap();
    EngineConfig::write_default_if_missing(&path).unwrap();
    let loaded = EngineConfig::from_file(&path).unwrap();
    assert_eq!(loaded.max_conditional_attempts, 7);
}

#[test]
fn partial_file_keeps_other_defaults() {
    let config = EngineConfig::from_toml_str(
        r#"
[limits]
max_collections = 1

[hybrid]
lexical_weight = 2.0
"#,
    )
    .unwrap();
    assert_eq!(config.limits.max_collections, 1);
    assert_eq!(config.limits.default_page_size, 20);
    assert_eq!(config.hybrid.lexical_weight, 2.0);
    assert_eq!(config.hybrid.rrf_k, 60.0);
    assert_eq!(config.session, tessera::SessionConfig::default());
}

#[test]
fn invalid_files_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(tessera::CONFIG_FILE_NAME);

    let missing = EngineConfig::from_file(&path).unwrap_err();
    assert_eq!(missing.code(), "INVALID_CONFIGURATION");

    std::fs::write(&path, "max_conditional_attempts = 0\n").unwrap();
    let err = EngineConfig::from_file(&path).unwrap_err();
    assert_eq!(err.code(), "INVALID_CONFIGURATION");
    assert!(err.to_string().contains("max_conditional_attempts"));

    std::fs::write(&path, "[limits]\nmax_page_size = \"big\"\n").unwrap();
    assert_eq!(EngineConfig::from_file(&path).unwrap_err().code(), "INVALID_CONFIGURATION");
}

#[test]
fn engine_rejects_invalid_config() {
    let mut config = EngineConfig::with_small_limits();
    config.limits.default_page_size = config.limits.max_page_size + 1;
    let err = Engine::new(Arc::new(MemoryCluster::new()), config).unwrap_err();
    assert_eq!(err.code(), "INVALID_CONFIGURATION");
}

#[test]
fn engine_uses_loaded_limits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(tessera::CONFIG_FILE_NAME);
    let mut config = EngineConfig::with_small_limits();
    config.limits.max_collections = 1;
    config.limits.default_page_size = 2;
    config.write_to_file(&path).unwrap();

    let db = TestDb::with_config(EngineConfig::from_file(&path).unwrap());
    db.create_collection("only", json!({}));
    let code = db.fail(&db.namespace_ctx(), json!({"createCollection": {"name": "other"}}));
    assert_eq!(code, "TOO_MANY_COLLECTIONS");

    let ctx = db.collection_ctx("only");
    db.ok(&ctx, json!({"insertMany": {"documents": [{"n": 1}, {"n": 2}, {"n": 3}]}}));
    let response = db.ok(&ctx, json!({"find": {}}));
    assert_eq!(response["data"]["documents"].as_array().map(Vec::len), Some(2));
    assert!(response["data"]["nextPageState"].is_string());
}
