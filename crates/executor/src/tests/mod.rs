//! Test modules for the executor crate.

pub mod envelope;

use std::sync::Arc;

use tessera_core::{CollectionName, NamespaceName, TenantId};
use tessera_engine::{Engine, EngineConfig};
use tessera_storage::MemoryCluster;

use crate::{Executor, RequestContext};

/// Executor over a fresh in-memory cluster with small limits.
pub(crate) fn create_test_executor() -> (MemoryCluster, Executor) {
    let cluster = MemoryCluster::new();
    let engine = Engine::new(Arc::new(cluster.clone()), EngineConfig::with_small_limits()).unwrap();
    (cluster, Executor::new(Arc::new(engine)))
}

pub(crate) fn tenant_ctx() -> RequestContext {
    RequestContext::new(TenantId::new("tenant1").unwrap())
}

pub(crate) fn namespace_ctx() -> RequestContext {
    tenant_ctx().with_namespace(NamespaceName::new("ks").unwrap())
}

pub(crate) fn collection_ctx(name: &str) -> RequestContext {
    namespace_ctx().with_collection(CollectionName::new(name).unwrap())
}

/// Executor with namespace `ks` created.
pub(crate) fn executor_with_namespace() -> (MemoryCluster, Executor) {
    let (cluster, executor) = create_test_executor();
    let response = executor.execute_json(&tenant_ctx(), r#"{"createNamespace": {"name": "ks"}}"#);
    assert!(response.errors.is_none(), "{:?}", response);
    (cluster, executor)
}
