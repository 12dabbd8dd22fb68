//! Engine facade
//!
//! [`Engine`] owns one instance of each component and runs a command against
//! the tenant's session. Every operation goes through `with_session`, which
//! reports total-outage errors to the [`SessionRegistry`] so the next command
//! reconnects.

use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, warn};

use tessera_core::{CollectionName, NamespaceName, TenantId};
use tessera_storage::{Statement, StoreConnector};

use crate::catalog::{CollectionSchema, DefineOutcome, DropOutcome, SchemaCatalog};
use crate::config::EngineConfig;
use crate::controller::ConcurrencyController;
use crate::error::{Error, Result};
use crate::limiter::ResourceLimiter;
use crate::planner::CommandPlanner;
use crate::read::DocumentReader;
use crate::request::{
    CountRequest, CountResult, CreateCollectionRequest, DeleteCollectionRequest,
    DeleteManyRequest, DeleteOneRequest, DeleteResult, FindCollectionsRequest, FindOneRequest,
    FindRequest, FindResult, InsertManyRequest, InsertOneRequest, InsertResult, UpdateOneRequest,
    UpdateResult,
};
use crate::session::{SessionRegistry, TenantSession};
use crate::shred::Document;

/// Fully qualified collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    /// Owning tenant
    pub tenant: TenantId,
    /// Namespace
    pub namespace: NamespaceName,
    /// Collection
    pub collection: CollectionName,
}

impl CollectionRef {
    /// Build a reference.
    pub fn new(tenant: TenantId, namespace: NamespaceName, collection: CollectionName) -> Self {
        CollectionRef {
            tenant,
            namespace,
            collection,
        }
    }
}

/// The document command engine.
pub struct Engine {
    config: EngineConfig,
    limiter: Arc<ResourceLimiter>,
    registry: SessionRegistry,
    catalog: SchemaCatalog,
    planner: CommandPlanner,
    reader: DocumentReader,
    controller: ConcurrencyController,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("live_sessions", &self.registry.live_sessions())
            .finish()
    }
}

impl Engine {
    /// Create an engine opening tenant sessions through `connector`.
    pub fn new(connector: Arc<dyn StoreConnector>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let limiter = Arc::new(ResourceLimiter::new(config.limits.clone()));
        let registry = SessionRegistry::new(connector, Arc::clone(&limiter), &config.session);
        Ok(Engine {
            catalog: SchemaCatalog::new(Arc::clone(&limiter)),
            planner: CommandPlanner::new(config.limits.clone()),
            reader: DocumentReader::new(config.limits.clone(), config.hybrid.clone()),
            controller: ConcurrencyController::new(config.max_conditional_attempts, config.limits.clone()),
            limiter,
            registry,
            config,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resource limiter.
    pub fn limiter(&self) -> &ResourceLimiter {
        &self.limiter
    }

    /// Session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Reject a request body over the size limit.
    pub fn check_request_size(&self, len: usize) -> Result<()> {
        self.limiter.check_request_size(len)
    }

    fn with_session<T>(
        &self,
        tenant: &TenantId,
        op: &'static str,
        f: impl FnOnce(&TenantSession) -> Result<T>,
    ) -> Result<T> {
        let session = self.registry.get_session(tenant)?;
        let result = f(&session);
        if let Err(e) = &result {
            if self.registry.report_failure(&session, e) {
                warn!(target: "tessera::engine", tenant = %tenant, op, error = %e, "command failed on evicted session");
            } else {
                debug!(target: "tessera::engine", tenant = %tenant, op, code = e.code(), "command failed");
            }
        }
        result
    }

    fn resolve(&self, session: &TenantSession, target: &CollectionRef) -> Result<Arc<CollectionSchema>> {
        self.catalog
            .resolve(session, &target.namespace, &target.collection)
    }

    // =========================================================================
    // Namespaces
    // =========================================================================

    /// `createNamespace`. Returns false if it already existed.
    pub fn create_namespace(&self, tenant: &TenantId, namespace: &NamespaceName) -> Result<bool> {
        self.with_session(tenant, "createNamespace", |session| {
            self.catalog.create_namespace(session, namespace)
        })
    }

    /// `dropNamespace`. Returns false if it did not exist.
    pub fn drop_namespace(&self, tenant: &TenantId, namespace: &NamespaceName) -> Result<bool> {
        self.with_session(tenant, "dropNamespace", |session| {
            self.catalog.drop_namespace(session, namespace)
        })
    }

    /// `findNamespaces`.
    pub fn find_namespaces(&self, tenant: &TenantId) -> Result<Vec<String>> {
        self.with_session(tenant, "findNamespaces", |session| {
            self.catalog.list_namespaces(session)
        })
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// `createCollection`. Identical re-creation succeeds.
    pub fn create_collection(
        &self,
        tenant: &TenantId,
        namespace: &NamespaceName,
        request: &CreateCollectionRequest,
    ) -> Result<DefineOutcome> {
        let name = CollectionName::new(request.name.as_str())?;
        self.with_session(tenant, "createCollection", |session| {
            self.catalog.define(session, namespace, &name, &request.options)
        })
    }

    /// `deleteCollection`. Deleting a missing collection succeeds.
    pub fn delete_collection(
        &self,
        tenant: &TenantId,
        namespace: &NamespaceName,
        request: &DeleteCollectionRequest,
    ) -> Result<DropOutcome> {
        let name = CollectionName::new(request.name.as_str())?;
        self.with_session(tenant, "deleteCollection", |session| {
            self.catalog.drop(session, namespace, &name)
        })
    }

    /// `findCollections`: names, or `{name, options}` objects with `explain`.
    pub fn find_collections(
        &self,
        tenant: &TenantId,
        namespace: &NamespaceName,
        request: &FindCollectionsRequest,
    ) -> Result<Vec<JsonValue>> {
        let schemas = self.with_session(tenant, "findCollections", |session| {
            self.catalog.list(session, namespace)
        })?;
        Ok(schemas
            .iter()
            .map(|schema| {
                if request.options.explain {
                    json!({"name": schema.name.as_str(), "options": schema.options})
                } else {
                    JsonValue::String(schema.name.to_string())
                }
            })
            .collect())
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// `insertOne`.
    pub fn insert_one(&self, target: &CollectionRef, request: &InsertOneRequest) -> Result<InsertResult> {
        self.with_session(&target.tenant, "insertOne", |session| {
            let schema = self.resolve(session, target)?;
            let id = self.insert_document(session, &schema, request.document.clone())?;
            Ok(InsertResult {
                inserted_ids: vec![id],
                failures: Vec::new(),
            })
        })
    }

    /// `insertMany`.
    ///
    /// Ordered inserts stop at the first failure; unordered inserts attempt
    /// every document. An outage aborts either way.
    pub fn insert_many(&self, target: &CollectionRef, request: &InsertManyRequest) -> Result<InsertResult> {
        let max = self.config.limits.max_documents_per_insert;
        if request.documents.len() > max {
            return Err(Error::invalid_request(format!(
                "insertMany accepts at most {} documents, got {}",
                max,
                request.documents.len()
            )));
        }
        self.with_session(&target.tenant, "insertMany", |session| {
            let schema = self.resolve(session, target)?;
            let mut result = InsertResult::default();
            for (position, document) in request.documents.iter().enumerate() {
                match self.insert_document(session, &schema, document.clone()) {
                    Ok(id) => result.inserted_ids.push(id),
                    Err(e) if e.is_unavailable() => return Err(e),
                    Err(e) => {
                        result.failures.push((position, e));
                        if request.options.ordered {
                            break;
                        }
                    }
                }
            }
            debug!(
                target: "tessera::engine",
                tenant = %target.tenant,
                collection = %target.collection,
                inserted = result.inserted_ids.len(),
                failed = result.failures.len(),
                "insert many"
            );
            Ok(result)
        })
    }

    fn insert_document(
        &self,
        session: &TenantSession,
        schema: &CollectionSchema,
        document: JsonValue,
    ) -> Result<JsonValue> {
        let document = Document::from_json(document, &self.config.limits)?;
        let row = document.shred(schema)?;
        let result = session.execute(&Statement::Insert {
            keyspace: schema.keyspace().to_string(),
            table: schema.table().to_string(),
            row,
            if_not_exists: true,
        })?;
        if !result.applied {
            return Err(Error::DocumentExists {
                id: document.id.to_string(),
            });
        }
        Ok(document.id.to_json())
    }

    /// `find`.
    pub fn find(&self, target: &CollectionRef, request: &FindRequest) -> Result<FindResult> {
        self.with_session(&target.tenant, "find", |session| {
            let schema = self.resolve(session, target)?;
            let plan = self.planner.plan_find(schema, request)?;
            self.reader.find(session, &plan)
        })
    }

    /// `findOne`: the first match, if any.
    pub fn find_one(&self, target: &CollectionRef, request: FindOneRequest) -> Result<Option<JsonValue>> {
        let request = FindRequest::from(request);
        let result = self.find(target, &request)?;
        Ok(result.documents.into_iter().next())
    }

    /// `countDocuments`.
    pub fn count_documents(&self, target: &CollectionRef, request: &CountRequest) -> Result<CountResult> {
        self.with_session(&target.tenant, "countDocuments", |session| {
            let schema = self.resolve(session, target)?;
            let plan = self.planner.plan_count(schema, request)?;
            self.reader.count(session, &plan)
        })
    }

    /// `updateOne`.
    pub fn update_one(&self, target: &CollectionRef, request: &UpdateOneRequest) -> Result<UpdateResult> {
        self.with_session(&target.tenant, "updateOne", |session| {
            let schema = self.resolve(session, target)?;
            let plan = self.planner.plan_update_one(schema, request)?;
            self.controller.execute_update(session, &self.reader, &plan)
        })
    }

    /// `deleteOne`.
    pub fn delete_one(&self, target: &CollectionRef, request: &DeleteOneRequest) -> Result<DeleteResult> {
        self.with_session(&target.tenant, "deleteOne", |session| {
            let schema = self.resolve(session, target)?;
            let plan = self.planner.plan_delete_one(schema, request)?;
            self.controller.execute_delete_one(session, &self.reader, &plan)
        })
    }

    /// `deleteMany`: one batch of at most `max_documents_per_delete`.
    pub fn delete_many(&self, target: &CollectionRef, request: &DeleteManyRequest) -> Result<DeleteResult> {
        self.with_session(&target.tenant, "deleteMany", |session| {
            let schema = self.resolve(session, target)?;
            let plan = self.planner.plan_delete_many(schema, request)?;
            self.controller.execute_delete_many(session, &self.reader, &plan)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::CollectionOptions;
    use tessera_storage::MemoryCluster;

    fn setup() -> (MemoryCluster, Engine, CollectionRef) {
        let cluster = MemoryCluster::new();
        let engine = Engine::new(Arc::new(cluster.clone()), EngineConfig::default()).unwrap();
        let target = CollectionRef::new(
            TenantId::new("t1").unwrap(),
            NamespaceName::new("ks").unwrap(),
            CollectionName::new("docs").unwrap(),
        );
        engine.create_namespace(&target.tenant, &target.namespace).unwrap();
        engine
            .create_collection(
                &target.tenant,
                &target.namespace,
                &CreateCollectionRequest {
                    name: "docs".into(),
                    options: CollectionOptions::default(),
                },
            )
            .unwrap();
        (cluster, engine, target)
    }

    fn many(documents: Vec<JsonValue>, ordered: bool) -> InsertManyRequest {
        serde_json::from_value(json!({"documents": documents, "options": {"ordered": ordered}})).unwrap()
    }

    #[test]
    fn test_insert_then_find_one() {
        let (_, engine, target) = setup();
        let inserted = engine
            .insert_one(&target, &InsertOneRequest { document: json!({"_id": 1, "a": "x"}) })
            .unwrap();
        assert_eq!(inserted.inserted_ids, vec![json!(1)]);
        let found = engine
            .find_one(&target, serde_json::from_value(json!({"filter": {"a": "x"}})).unwrap())
            .unwrap();
        assert_eq!(found, Some(json!({"_id": 1, "a": "x"})));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let (_, engine, target) = setup();
        let request = InsertOneRequest { document: json!({"_id": "a"}) };
        engine.insert_one(&target, &request).unwrap();
        let err = engine.insert_one(&target, &request).unwrap_err();
        assert_eq!(err.code(), "DOCUMENT_ALREADY_EXISTS");
    }

    #[test]
    fn test_insert_many_ordered_stops_at_failure() {
        let (_, engine, target) = setup();
        let result = engine
            .insert_many(&target, &many(vec![json!({"_id": 1}), json!({"_id": 1}), json!({"_id": 2})], true))
            .unwrap();
        assert_eq!(result.inserted_ids, vec![json!(1)]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].0, 1);
    }

    #[test]
    fn test_insert_many_unordered_continues() {
        let (_, engine, target) = setup();
        let result = engine
            .insert_many(&target, &many(vec![json!({"_id": 1}), json!({"_id": 1}), json!({"_id": 2})], false))
            .unwrap();
        assert_eq!(result.inserted_ids, vec![json!(1), json!(2)]);
        assert_eq!(result.failures.len(), 1);
    }

    #[test]
    fn test_unknown_collection() {
        let (_, engine, mut target) = setup();
        target.collection = CollectionName::new("missing").unwrap();
        let err = engine
            .count_documents(&target, &CountRequest::default())
            .unwrap_err();
        assert_eq!(err.code(), "COLLECTION_NOT_EXIST");
    }

    #[test]
    fn test_outage_evicts_then_recovers() {
        let (cluster, engine, target) = setup();
        cluster.fail_all_nodes();
        let err = engine
            .count_documents(&target, &CountRequest::default())
            .unwrap_err();
        assert!(err.is_unavailable());
        assert!(engine.registry().peek(&target.tenant).is_none());

        cluster.restore();
        let count = engine.count_documents(&target, &CountRequest::default()).unwrap();
        assert_eq!(count.count, 0);
    }

    #[test]
    fn test_find_collections_explain() {
        let (_, engine, target) = setup();
        let names = engine
            .find_collections(&target.tenant, &target.namespace, &FindCollectionsRequest::default())
            .unwrap();
        assert_eq!(names, vec![json!("docs")]);
        let explained = engine
            .find_collections(
                &target.tenant,
                &target.namespace,
                &serde_json::from_value(json!({"options": {"explain": true}})).unwrap(),
            )
            .unwrap();
        assert_eq!(explained[0]["name"], json!("docs"));
        assert!(explained[0]["options"].is_object());
    }
}
