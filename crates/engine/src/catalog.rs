//! Schema Catalog
//!
//! Maps collections onto physical tables. A collection's options and
//! generation are stored as JSON in the table comment, so the store's own
//! schema metadata is the single source of truth; the per-session cache is
//! only a read-through copy.
//!
//! ## Creation order
//!
//! 1. validate options
//! 2. compare with any existing definition (identical → no-op, no quota used)
//! 3. reserve collection and index quota
//! 4. `CREATE TABLE IF NOT EXISTS`
//! 5. create every required index; on failure drop the table again
//!
//! Steps 2-5 run under a per-collection lock, so callers in this process
//! never observe a half-built collection. Losing the `CREATE TABLE` race to
//! another node re-reads the winner's options and compares, exactly like
//! step 2; an identical table missing indexes has them completed first.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tessera_core::{CollectionName, CollectionOptions, Limits, NamespaceName, TenantId};
use tessera_storage::{IndexSpec, IndexTarget, Statement, TableMetadata};

use crate::error::{Error, Result};
use crate::limiter::{ResourceKind, ResourceLimiter};
use crate::session::TenantSession;

const SCHEMA_VERSION: u32 = 1;

/// Shredding indexes every collection carries.
const SHREDDING_INDEXES: [IndexTarget; 6] = [
    IndexTarget::ExistKeys,
    IndexTarget::ArrayContains,
    IndexTarget::TextValues,
    IndexTarget::NumberValues,
    IndexTarget::BoolValues,
    IndexTarget::NullValues,
];

/// A resolved collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSchema {
    /// Namespace (keyspace)
    pub namespace: NamespaceName,
    /// Collection (table) name
    pub name: CollectionName,
    /// Options fixed at creation
    pub options: CollectionOptions,
    /// Identity of this incarnation; a drop and re-create changes it
    pub generation: Uuid,
    /// Store indexes on the table
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSchema {
    /// Keyspace name.
    pub fn keyspace(&self) -> &str {
        self.namespace.as_str()
    }

    /// Table name.
    pub fn table(&self) -> &str {
        self.name.as_str()
    }

    /// Vector dimension, if vector search is configured.
    pub fn vector_dimension(&self) -> Option<usize> {
        self.options.vector().map(|v| v.dimension)
    }
}

/// Indexes a collection with `options` needs.
pub fn required_indexes(table: &str, options: &CollectionOptions) -> Vec<IndexSpec> {
    let mut targets: Vec<IndexTarget> = SHREDDING_INDEXES.to_vec();
    if let Some(vector) = options.vector() {
        targets.push(IndexTarget::Vector(vector.metric));
    }
    if let Some(lexical) = options.lexical() {
        targets.push(IndexTarget::Lexical(lexical.analyzer.clone()));
    }
    targets
        .into_iter()
        .map(|target| IndexSpec::for_table(table, target))
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct TableComment {
    collection: CommentBody,
}

#[derive(Debug, Serialize, Deserialize)]
struct CommentBody {
    name: String,
    schema_version: u32,
    generation: Uuid,
    options: CollectionOptions,
}

fn encode_comment(name: &CollectionName, options: &CollectionOptions, generation: Uuid) -> Result<String> {
    serde_json::to_string(&TableComment {
        collection: CommentBody {
            name: name.to_string(),
            schema_version: SCHEMA_VERSION,
            generation,
            options: options.normalized(),
        },
    })
    .map_err(|e| Error::invalid_request(format!("cannot encode collection options: {}", e)))
}

fn decode_table(namespace: &NamespaceName, table: &TableMetadata) -> Option<CollectionSchema> {
    let comment: TableComment = serde_json::from_str(&table.comment).ok()?;
    let name = CollectionName::new(table.name.clone()).ok()?;
    Some(CollectionSchema {
        namespace: namespace.clone(),
        name,
        options: comment.collection.options,
        generation: comment.collection.generation,
        indexes: table.indexes.clone(),
    })
}

/// Outcome of [`SchemaCatalog::define`].
#[derive(Debug, Clone, PartialEq)]
pub enum DefineOutcome {
    /// A new collection was created
    Created(Arc<CollectionSchema>),
    /// An identical collection already existed
    AlreadyExists(Arc<CollectionSchema>),
}

impl DefineOutcome {
    /// The collection, however it came to exist.
    pub fn schema(&self) -> &Arc<CollectionSchema> {
        match self {
            DefineOutcome::Created(s) | DefineOutcome::AlreadyExists(s) => s,
        }
    }
}

/// Outcome of [`SchemaCatalog::drop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// The collection was removed
    Dropped,
    /// There was nothing to remove
    NotFound,
}

type DefineKey = (TenantId, NamespaceName, CollectionName);

/// Collection lifecycle on top of the store's schema metadata.
pub struct SchemaCatalog {
    limiter: Arc<ResourceLimiter>,
    // One lifecycle operation at a time per collection.
    in_flight: DashMap<DefineKey, Arc<Mutex<()>>>,
}

impl SchemaCatalog {
    /// Create a catalog consulting `limiter` before creations.
    pub fn new(limiter: Arc<ResourceLimiter>) -> Self {
        SchemaCatalog {
            limiter,
            in_flight: DashMap::new(),
        }
    }

    fn limits(&self) -> &Limits {
        self.limiter.limits()
    }

    /// Run `f` while no other define or drop of the same collection runs.
    fn single_flight<T>(
        &self,
        session: &TenantSession,
        namespace: &NamespaceName,
        name: &CollectionName,
        f: impl FnOnce() -> T,
    ) -> T {
        let key = (session.tenant().clone(), namespace.clone(), name.clone());
        let slot = Arc::clone(&self.in_flight.entry(key.clone()).or_default());
        let result = {
            let _guard = slot.lock();
            f()
        };
        drop(slot);
        self.in_flight.remove_if(&key, |_, slot| Arc::strong_count(slot) == 1);
        result
    }

    fn load(
        &self,
        session: &TenantSession,
        namespace: &NamespaceName,
        name: &CollectionName,
    ) -> Result<Option<(TableMetadata, Option<CollectionSchema>)>> {
        let tables = session.tables(namespace.as_str())?;
        Ok(tables
            .into_iter()
            .find(|t| t.name == name.as_str())
            .map(|t| {
                let schema = decode_table(namespace, &t);
                (t, schema)
            }))
    }

    /// Look a collection up, reading through the session cache.
    pub fn resolve(
        &self,
        session: &TenantSession,
        namespace: &NamespaceName,
        name: &CollectionName,
    ) -> Result<Arc<CollectionSchema>> {
        if let Some(schema) = session.cached_schema(namespace, name) {
            return Ok(schema);
        }
        match self.load(session, namespace, name)? {
            Some((_, Some(schema))) => {
                let schema = Arc::new(schema);
                session.cache_schema(Arc::clone(&schema));
                Ok(schema)
            }
            _ => Err(Error::CollectionNotFound {
                collection: name.to_string(),
            }),
        }
    }

    /// Compare an existing table with the requested options.
    ///
    /// A matching table whose indexes are still incomplete (another node may
    /// be mid-creation) has the missing ones created before it is reported.
    fn compare(
        &self,
        existing: Option<CollectionSchema>,
        name: &CollectionName,
        options: &CollectionOptions,
        session: &TenantSession,
    ) -> Result<DefineOutcome> {
        let mut schema = match existing {
            Some(schema) if schema.options.is_equivalent(options) => schema,
            _ => {
                return Err(Error::CollectionConflict {
                    collection: name.to_string(),
                })
            }
        };
        let missing: Vec<IndexSpec> = required_indexes(name.as_str(), options)
            .into_iter()
            .filter(|required| !schema.indexes.iter().any(|i| i.name == required.name))
            .collect();
        if !missing.is_empty() {
            debug!(target: "tessera::catalog", collection = %name, missing = missing.len(), "completing indexes of existing collection");
            let reservation = self.limiter.try_reserve(
                session.tenant(),
                session.store(),
                ResourceKind::Index,
                missing.len(),
            )?;
            for index in &missing {
                session.execute(&Statement::CreateIndex {
                    keyspace: schema.namespace.to_string(),
                    table: name.to_string(),
                    index: index.clone(),
                })?;
            }
            reservation.confirm();
            schema.indexes.extend(missing);
        }
        let schema = Arc::new(schema);
        session.cache_schema(Arc::clone(&schema));
        Ok(DefineOutcome::AlreadyExists(schema))
    }

    /// Create a collection, or confirm an identical one exists.
    ///
    /// Concurrent definitions of the same collection are serialized, so an
    /// identical caller only sees [`DefineOutcome::AlreadyExists`] once the
    /// winner has finished every index, and sees the winner's error path as
    /// an absent table.
    pub fn define(
        &self,
        session: &TenantSession,
        namespace: &NamespaceName,
        name: &CollectionName,
        options: &CollectionOptions,
    ) -> Result<DefineOutcome> {
        options.validate(self.limits())?;
        self.single_flight(session, namespace, name, || {
            self.define_locked(session, namespace, name, options)
        })
    }

    fn define_locked(
        &self,
        session: &TenantSession,
        namespace: &NamespaceName,
        name: &CollectionName,
        options: &CollectionOptions,
    ) -> Result<DefineOutcome> {
        if let Some((_, existing)) = self.load(session, namespace, name)? {
            return self.compare(existing, name, options, session);
        }

        let indexes = required_indexes(name.as_str(), options);
        let reserved = self.limiter.try_reserve_all(
            session.tenant(),
            session.store(),
            &[
                (ResourceKind::Collection, 1),
                (ResourceKind::Index, indexes.len()),
            ],
        );
        let reservation = match reserved {
            Ok(reservation) => reservation,
            Err(denied) => {
                // Another node may hold the last slot for this same collection.
                if let Some((_, existing)) = self.load(session, namespace, name)? {
                    return self.compare(existing, name, options, session);
                }
                return Err(denied);
            }
        };

        let generation = Uuid::new_v4();
        let created = session.execute(&Statement::CreateTable {
            keyspace: namespace.to_string(),
            table: name.to_string(),
            comment: encode_comment(name, options, generation)?,
            vector_dimension: options.vector().map(|v| v.dimension),
        })?;
        if !created.applied {
            drop(reservation);
            debug!(target: "tessera::catalog", collection = %name, "lost create race");
            let existing = self.load(session, namespace, name)?.and_then(|(_, s)| s);
            return self.compare(existing, name, options, session);
        }

        for index in &indexes {
            let result = session.execute(&Statement::CreateIndex {
                keyspace: namespace.to_string(),
                table: name.to_string(),
                index: index.clone(),
            });
            if let Err(e) = result {
                warn!(target: "tessera::catalog", collection = %name, index = %index.name, error = %e, "index creation failed, dropping table");
                if let Err(rollback) = session.execute(&Statement::DropTable {
                    keyspace: namespace.to_string(),
                    table: name.to_string(),
                }) {
                    warn!(target: "tessera::catalog", collection = %name, error = %rollback, "rollback failed");
                }
                return Err(e);
            }
        }
        reservation.confirm();

        let schema = Arc::new(CollectionSchema {
            namespace: namespace.clone(),
            name: name.clone(),
            options: options.normalized(),
            generation,
            indexes,
        });
        session.cache_schema(Arc::clone(&schema));
        info!(target: "tessera::catalog", tenant = %session.tenant(), namespace = %namespace, collection = %name, "collection created");
        Ok(DefineOutcome::Created(schema))
    }

    /// Drop a collection and release its quota.
    pub fn drop(
        &self,
        session: &TenantSession,
        namespace: &NamespaceName,
        name: &CollectionName,
    ) -> Result<DropOutcome> {
        self.single_flight(session, namespace, name, || -> Result<DropOutcome> {
            session.forget_schema(namespace, name);
            let Some((table, _)) = self.load(session, namespace, name)? else {
                return Ok(DropOutcome::NotFound);
            };
            let generation = self.limiter.generation(session.tenant());
            let dropped = session.execute(&Statement::DropTable {
                keyspace: namespace.to_string(),
                table: name.to_string(),
            })?;
            if !dropped.applied {
                return Ok(DropOutcome::NotFound);
            }
            self.limiter.release(
                session.tenant(),
                generation,
                &[
                    (ResourceKind::Collection, 1),
                    (ResourceKind::Index, table.indexes.len()),
                ],
            );
            info!(target: "tessera::catalog", tenant = %session.tenant(), namespace = %namespace, collection = %name, "collection dropped");
            Ok(DropOutcome::Dropped)
        })
    }

    /// Every collection in a namespace, ordered by name.
    pub fn list(
        &self,
        session: &TenantSession,
        namespace: &NamespaceName,
    ) -> Result<Vec<Arc<CollectionSchema>>> {
        let mut schemas: Vec<Arc<CollectionSchema>> = session
            .tables(namespace.as_str())?
            .iter()
            .filter_map(|t| decode_table(namespace, t))
            .map(Arc::new)
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        for schema in &schemas {
            session.cache_schema(Arc::clone(schema));
        }
        Ok(schemas)
    }

    /// Create a namespace. Returns false if it already existed.
    pub fn create_namespace(&self, session: &TenantSession, namespace: &NamespaceName) -> Result<bool> {
        let result = session.execute(&Statement::CreateKeyspace {
            keyspace: namespace.to_string(),
        })?;
        if result.applied {
            info!(target: "tessera::catalog", tenant = %session.tenant(), namespace = %namespace, "namespace created");
        }
        Ok(result.applied)
    }

    /// Drop a namespace with all its collections. Returns false if absent.
    pub fn drop_namespace(&self, session: &TenantSession, namespace: &NamespaceName) -> Result<bool> {
        let tables = match session.tables(namespace.as_str()) {
            Ok(tables) => tables,
            Err(Error::NamespaceNotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        let generation = self.limiter.generation(session.tenant());
        let result = session.execute(&Statement::DropKeyspace {
            keyspace: namespace.to_string(),
        })?;
        session.forget_namespace(namespace);
        if result.applied {
            let indexes: usize = tables.iter().map(|t| t.indexes.len()).sum();
            self.limiter.release(
                session.tenant(),
                generation,
                &[
                    (ResourceKind::Collection, tables.len()),
                    (ResourceKind::Index, indexes),
                ],
            );
            info!(target: "tessera::catalog", tenant = %session.tenant(), namespace = %namespace, collections = tables.len(), "namespace dropped");
        }
        Ok(result.applied)
    }

    /// Every namespace, ordered by name.
    pub fn list_namespaces(&self, session: &TenantSession) -> Result<Vec<String>> {
        let mut names = session.keyspaces()?;
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::SessionRegistry;
    use tessera_core::SimilarityMetric;
    use tessera_storage::{MemoryCluster, StoreConnector};

    struct Fixture {
        limiter: Arc<ResourceLimiter>,
        catalog: SchemaCatalog,
        session: Arc<TenantSession>,
        ns: NamespaceName,
    }

    fn fixture(limits: Limits) -> Fixture {
        let cluster = MemoryCluster::new();
        let limiter = Arc::new(ResourceLimiter::new(limits));
        let registry = SessionRegistry::new(
            Arc::new(cluster) as Arc<dyn StoreConnector>,
            Arc::clone(&limiter),
            &SessionConfig::default(),
        );
        let session = registry.get_session(&TenantId::new("t").unwrap()).unwrap();
        let catalog = SchemaCatalog::new(Arc::clone(&limiter));
        let ns = NamespaceName::new("ks").unwrap();
        catalog.create_namespace(&session, &ns).unwrap();
        Fixture {
            limiter,
            catalog,
            session,
            ns,
        }
    }

    fn name(s: &str) -> CollectionName {
        CollectionName::new(s).unwrap()
    }

    #[test]
    fn test_required_index_count() {
        assert_eq!(required_indexes("t", &CollectionOptions::default()).len(), 6);
        let full = CollectionOptions::default()
            .with_vector(3, SimilarityMetric::Cosine)
            .with_lexical("standard");
        let indexes = required_indexes("t", &full);
        assert_eq!(indexes.len(), 8);
        assert!(indexes.iter().any(|i| i.name == "t_query_vector_value"));
    }

    #[test]
    fn test_define_identical_twice() {
        let f = fixture(Limits::default());
        let options = CollectionOptions::default().with_vector(3, SimilarityMetric::DotProduct);
        let first = f.catalog.define(&f.session, &f.ns, &name("c"), &options).unwrap();
        assert!(matches!(first, DefineOutcome::Created(_)));
        let second = f.catalog.define(&f.session, &f.ns, &name("c"), &options).unwrap();
        assert!(matches!(second, DefineOutcome::AlreadyExists(_)));
        assert_eq!(first.schema().generation, second.schema().generation);
        assert_eq!(f.session.tables("ks").unwrap().len(), 1);
        assert_eq!(f.limiter.usage(f.session.tenant()).unwrap().collections, 1);
    }

    #[test]
    fn test_define_different_options_conflicts() {
        let f = fixture(Limits::default());
        let original = CollectionOptions::default().with_vector(3, SimilarityMetric::Cosine);
        f.catalog.define(&f.session, &f.ns, &name("c"), &original).unwrap();
        let err = f
            .catalog
            .define(
                &f.session,
                &f.ns,
                &name("c"),
                &CollectionOptions::default().with_vector(4, SimilarityMetric::Cosine),
            )
            .unwrap_err();
        assert_eq!(err.code(), "EXISTING_COLLECTION_DIFFERENT_SETTINGS");
        let schema = f.catalog.resolve(&f.session, &f.ns, &name("c")).unwrap();
        assert_eq!(schema.options, original.normalized());
    }

    #[test]
    fn test_limit_then_recreate_existing() {
        let f = fixture(Limits {
            max_collections: 2,
            ..Limits::default()
        });
        let opts = CollectionOptions::default();
        f.catalog.define(&f.session, &f.ns, &name("a"), &opts).unwrap();
        f.catalog.define(&f.session, &f.ns, &name("b"), &opts).unwrap();
        let err = f.catalog.define(&f.session, &f.ns, &name("c"), &opts).unwrap_err();
        assert_eq!(
            err,
            Error::TooManyCollections {
                current: 2,
                limit: 2
            }
        );
        assert!(f.catalog.define(&f.session, &f.ns, &name("a"), &opts).is_ok());
    }

    #[test]
    fn test_index_limit() {
        let f = fixture(Limits {
            max_indexes: 10,
            ..Limits::default()
        });
        let opts = CollectionOptions::default();
        f.catalog.define(&f.session, &f.ns, &name("a"), &opts).unwrap();
        let err = f.catalog.define(&f.session, &f.ns, &name("b"), &opts).unwrap_err();
        assert_eq!(err.code(), "TOO_MANY_INDEXES");
        assert!(f.session.tables("ks").unwrap().iter().all(|t| t.name != "b"));
    }

    #[test]
    fn test_failed_index_rolls_back() {
        let f = fixture(Limits::default());
        // The store rejects an unknown analyzer when the index is created.
        let opts = CollectionOptions::default().with_lexical("klingon");
        let err = f.catalog.define(&f.session, &f.ns, &name("c"), &opts).unwrap_err();
        assert_eq!(err.code(), "SERVER_QUERY_FAILURE");
        assert!(f.session.tables("ks").unwrap().is_empty());
        assert_eq!(f.limiter.usage(f.session.tenant()).unwrap().collections, 0);
        assert_eq!(f.limiter.usage(f.session.tenant()).unwrap().indexes, 0);
    }

    #[test]
    fn test_drop_releases_quota() {
        let f = fixture(Limits {
            max_collections: 1,
            ..Limits::default()
        });
        let opts = CollectionOptions::default();
        f.catalog.define(&f.session, &f.ns, &name("a"), &opts).unwrap();
        assert_eq!(
            f.catalog.drop(&f.session, &f.ns, &name("a")).unwrap(),
            DropOutcome::Dropped
        );
        assert_eq!(
            f.catalog.drop(&f.session, &f.ns, &name("a")).unwrap(),
            DropOutcome::NotFound
        );
        assert!(f.catalog.define(&f.session, &f.ns, &name("b"), &opts).is_ok());
    }

    #[test]
    fn test_recreate_changes_generation() {
        let f = fixture(Limits::default());
        let opts = CollectionOptions::default();
        let first = f.catalog.define(&f.session, &f.ns, &name("a"), &opts).unwrap();
        f.catalog.drop(&f.session, &f.ns, &name("a")).unwrap();
        let second = f.catalog.define(&f.session, &f.ns, &name("a"), &opts).unwrap();
        assert_ne!(first.schema().generation, second.schema().generation);
    }

    #[test]
    fn test_resolve_missing() {
        let f = fixture(Limits::default());
        let err = f.catalog.resolve(&f.session, &f.ns, &name("nope")).unwrap_err();
        assert_eq!(err.code(), "COLLECTION_NOT_EXIST");
        let err = f
            .catalog
            .resolve(&f.session, &NamespaceName::new("other").unwrap(), &name("nope"))
            .unwrap_err();
        assert_eq!(err.code(), "NAMESPACE_NOT_EXIST");
    }

    #[test]
    fn test_invalid_options_rejected_before_quota() {
        let f = fixture(Limits::default());
        let opts = CollectionOptions::default().with_vector(0, SimilarityMetric::Cosine);
        let err = f.catalog.define(&f.session, &f.ns, &name("a"), &opts).unwrap_err();
        assert_eq!(err.code(), "INVALID_COLLECTION_OPTIONS");
        assert_eq!(f.limiter.usage(f.session.tenant()), None);
    }

    #[test]
    fn test_list_and_drop_namespace() {
        let f = fixture(Limits::default());
        let opts = CollectionOptions::default();
        f.catalog.define(&f.session, &f.ns, &name("b"), &opts).unwrap();
        f.catalog.define(&f.session, &f.ns, &name("a"), &opts).unwrap();
        let names: Vec<String> = f
            .catalog
            .list(&f.session, &f.ns)
            .unwrap()
            .iter()
            .map(|s| s.name.to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        assert!(f.catalog.drop_namespace(&f.session, &f.ns).unwrap());
        assert!(!f.catalog.drop_namespace(&f.session, &f.ns).unwrap());
        assert_eq!(f.limiter.usage(f.session.tenant()).unwrap(), Default::default());
        assert!(f.catalog.list_namespaces(&f.session).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_identical_define_creates_one_table() {
        let f = fixture(Limits::default());
        let opts = CollectionOptions::default().with_lexical("standard");
        let barrier = std::sync::Barrier::new(4);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    barrier.wait();
                    f.catalog.define(&f.session, &f.ns, &name("c"), &opts).unwrap();
                });
            }
        });
        assert_eq!(f.session.tables("ks").unwrap().len(), 1);
        assert_eq!(f.limiter.usage(f.session.tenant()).unwrap().collections, 1);
        assert_eq!(f.limiter.usage(f.session.tenant()).unwrap().indexes, 7);
    }

    #[test]
    fn test_concurrent_define_sees_failed_creation() {
        let f = fixture(Limits::default());
        let opts = CollectionOptions::default().with_lexical("klingon");
        for _ in 0..50 {
            let barrier = std::sync::Barrier::new(2);
            let results: Vec<Result<DefineOutcome>> = std::thread::scope(|s| {
                let mut handles = Vec::new();
                for _ in 0..2 {
                    handles.push(s.spawn(|| {
                        barrier.wait();
                        f.catalog.define(&f.session, &f.ns, &name("c"), &opts)
                    }));
                }
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });
            for result in results {
                assert_eq!(result.unwrap_err().code(), "SERVER_QUERY_FAILURE");
            }
            assert!(f.session.tables("ks").unwrap().is_empty());
        }
        assert_eq!(f.limiter.usage(f.session.tenant()).unwrap(), Default::default());
    }

    #[test]
    fn test_concurrent_identical_define_at_last_slot() {
        let f = fixture(Limits {
            max_collections: 2,
            ..Limits::default()
        });
        let opts = CollectionOptions::default();
        f.catalog.define(&f.session, &f.ns, &name("a"), &opts).unwrap();
        let barrier = std::sync::Barrier::new(3);
        std::thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    barrier.wait();
                    f.catalog.define(&f.session, &f.ns, &name("b"), &opts).unwrap();
                });
            }
        });
        assert_eq!(f.session.tables("ks").unwrap().len(), 2);
        assert_eq!(f.limiter.usage(f.session.tenant()).unwrap().collections, 2);
    }

    #[test]
    fn test_identical_define_completes_missing_indexes() {
        let f = fixture(Limits::default());
        let opts = CollectionOptions::default().with_lexical("standard");
        f.catalog.define(&f.session, &f.ns, &name("c"), &opts).unwrap();
        // Leave the table as a creator on another node would mid-way.
        let mut partial = required_indexes("c", &opts);
        partial.truncate(3);
        f.session
            .execute(&Statement::DropTable {
                keyspace: "ks".into(),
                table: "c".into(),
            })
            .unwrap();
        f.session
            .execute(&Statement::CreateTable {
                keyspace: "ks".into(),
                table: "c".into(),
                comment: encode_comment(&name("c"), &opts, Uuid::new_v4()).unwrap(),
                vector_dimension: None,
            })
            .unwrap();
        for index in partial {
            f.session
                .execute(&Statement::CreateIndex {
                    keyspace: "ks".into(),
                    table: "c".into(),
                    index,
                })
                .unwrap();
        }
        f.session.forget_schema(&f.ns, &name("c"));
        f.limiter.invalidate(f.session.tenant());

        let outcome = f.catalog.define(&f.session, &f.ns, &name("c"), &opts).unwrap();
        assert!(matches!(outcome, DefineOutcome::AlreadyExists(_)));
        assert_eq!(outcome.schema().indexes.len(), 7);
        let table = f.session.tables("ks").unwrap().remove(0);
        assert_eq!(table.indexes.len(), 7);
        assert_eq!(f.limiter.usage(f.session.tenant()).unwrap().indexes, 7);
    }

    #[test]
    fn test_drop_after_reseed_keeps_counts() {
        let f = fixture(Limits::default());
        let opts = CollectionOptions::default();
        f.catalog.define(&f.session, &f.ns, &name("a"), &opts).unwrap();
        f.catalog.define(&f.session, &f.ns, &name("b"), &opts).unwrap();
        f.catalog.drop(&f.session, &f.ns, &name("a")).unwrap();
        f.limiter.invalidate(f.session.tenant());
        f.catalog.define(&f.session, &f.ns, &name("c"), &opts).unwrap();
        f.catalog.drop(&f.session, &f.ns, &name("b")).unwrap();
        let usage = f.limiter.usage(f.session.tenant()).unwrap();
        assert_eq!(usage.collections, 1);
        assert_eq!(usage.indexes, 6);
    }
}
