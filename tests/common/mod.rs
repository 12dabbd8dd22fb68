//! Shared test utilities for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

pub use serde_json::{json, Value as JsonValue};
pub use tessera::{
    CollectionName, CommandResponse, Engine, EngineConfig, Executor, MemoryCluster, NamespaceName,
    RequestContext, TenantId,
};

/// An executor over its own in-memory cluster.
pub struct TestDb {
    pub cluster: MemoryCluster,
    pub executor: Executor,
    pub tenant: TenantId,
}

impl TestDb {
    /// Fresh store with small limits and namespace `ks`.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::with_small_limits())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let cluster = MemoryCluster::new();
        let engine = Engine::new(Arc::new(cluster.clone()), config).expect("engine");
        let db = TestDb {
            cluster,
            executor: Executor::new(Arc::new(engine)),
            tenant: TenantId::new("tenant1").expect("tenant"),
        };
        db.ok(&db.tenant_ctx(), json!({"createNamespace": {"name": "ks"}}));
        db
    }

    pub fn tenant_ctx(&self) -> RequestContext {
        RequestContext::new(self.tenant.clone())
    }

    pub fn namespace_ctx(&self) -> RequestContext {
        self.tenant_ctx()
            .with_namespace(NamespaceName::new("ks").expect("namespace"))
    }

    pub fn collection_ctx(&self, name: &str) -> RequestContext {
        self.namespace_ctx()
            .with_collection(CollectionName::new(name).expect("collection"))
    }

    /// Run a command and return the envelope as JSON.
    pub fn run(&self, ctx: &RequestContext, body: JsonValue) -> JsonValue {
        self.executor.execute_json(ctx, &body.to_string()).to_json()
    }

    /// Run a command that must succeed.
    pub fn ok(&self, ctx: &RequestContext, body: JsonValue) -> JsonValue {
        let response = self.run(ctx, body.clone());
        assert!(response.get("errors").is_none(), "{} failed: {}", body, response);
        response
    }

    /// Run a command that must fail; returns its error code.
    pub fn fail(&self, ctx: &RequestContext, body: JsonValue) -> String {
        let response = self.run(ctx, body.clone());
        response["errors"][0]["errorCode"]
            .as_str()
            .unwrap_or_else(|| panic!("{} should have failed: {}", body, response))
            .to_string()
    }

    pub fn create_collection(&self, name: &str, options: JsonValue) {
        self.ok(
            &self.namespace_ctx(),
            json!({"createCollection": {"name": name, "options": options}}),
        );
    }
}

/// `_id` values of a list of documents.
pub fn ids(documents: &JsonValue) -> Vec<JsonValue> {
    documents
        .as_array()
        .map(|docs| docs.iter().map(|d| d["_id"].clone()).collect())
        .unwrap_or_default()
}
