//! In-memory column store
//!
//! [`MemoryCluster`] stands in for a real cluster: one database per tenant,
//! keyspaces holding tables, tables holding shredded rows and secondary
//! indexes.
//!
//! # Fault injection
//!
//! [`MemoryCluster::fail_all_nodes`] simulates a total outage. Every session
//! opened before the outage stays broken even after
//! [`MemoryCluster::restore`], the way a driver session that lost every
//! control connection does; only a fresh [`StoreConnector::connect`] works
//! again. This is what forces the engine to evict and recreate sessions.

mod table;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use tessera_core::TenantId;

use crate::error::{StoreError, StoreResult};
use crate::row::{ResultSet, TableMetadata};
use crate::session::{StoreConnector, StoreSession};
use crate::statement::Statement;

use table::MemoryTable;

#[derive(Default)]
struct MemoryDatabase {
    keyspaces: RwLock<BTreeMap<String, BTreeMap<String, Arc<MemoryTable>>>>,
}

impl MemoryDatabase {
    fn table(&self, keyspace: &str, table: &str) -> StoreResult<Arc<MemoryTable>> {
        let keyspaces = self.keyspaces.read();
        let tables = keyspaces
            .get(keyspace)
            .ok_or_else(|| StoreError::KeyspaceNotFound(keyspace.to_string()))?;
        tables
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound {
                keyspace: keyspace.to_string(),
                table: table.to_string(),
            })
    }
}

struct ClusterState {
    databases: DashMap<TenantId, Arc<MemoryDatabase>>,
    available: AtomicBool,
    epoch: AtomicU64,
    connects: AtomicUsize,
    connect_delay: Mutex<Option<Duration>>,
}

/// In-process cluster implementing [`StoreConnector`].
#[derive(Clone)]
pub struct MemoryCluster {
    state: Arc<ClusterState>,
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCluster {
    /// Create an empty, reachable cluster.
    pub fn new() -> Self {
        MemoryCluster {
            state: Arc::new(ClusterState {
                databases: DashMap::new(),
                available: AtomicBool::new(true),
                epoch: AtomicU64::new(0),
                connects: AtomicUsize::new(0),
                connect_delay: Mutex::new(None),
            }),
        }
    }

    /// Make every node unreachable and invalidate all open sessions.
    pub fn fail_all_nodes(&self) {
        self.state.available.store(false, Ordering::SeqCst);
        self.state.epoch.fetch_add(1, Ordering::SeqCst);
        debug!(target: "tessera::store", "all nodes marked down");
    }

    /// Bring nodes back. Sessions broken by the outage stay broken.
    pub fn restore(&self) {
        self.state.available.store(true, Ordering::SeqCst);
        debug!(target: "tessera::store", "nodes restored");
    }

    /// Whether the cluster currently accepts connections.
    pub fn is_available(&self) -> bool {
        self.state.available.load(Ordering::SeqCst)
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Slow down connects (widens races in tests).
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *self.state.connect_delay.lock() = delay;
    }
}

impl StoreConnector for MemoryCluster {
    fn connect(&self, tenant: &TenantId) -> StoreResult<Arc<dyn StoreSession>> {
        let delay = *self.state.connect_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if !self.is_available() {
            return Err(StoreError::AllNodesFailed(
                "no host was available to open the connection".into(),
            ));
        }
        let db = self
            .state
            .databases
            .entry(tenant.clone())
            .or_default()
            .clone();
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemorySession {
            cluster: Arc::clone(&self.state),
            db,
            epoch: self.state.epoch.load(Ordering::SeqCst),
        }))
    }
}

/// Session bound to one tenant database of a [`MemoryCluster`].
pub struct MemorySession {
    cluster: Arc<ClusterState>,
    db: Arc<MemoryDatabase>,
    epoch: u64,
}

impl MemorySession {
    fn check_alive(&self) -> StoreResult<()> {
        if !self.cluster.available.load(Ordering::SeqCst)
            || self.cluster.epoch.load(Ordering::SeqCst) != self.epoch
        {
            return Err(StoreError::AllNodesFailed(
                "all host(s) tried for query failed".into(),
            ));
        }
        Ok(())
    }

    fn execute_schema(&self, statement: &Statement) -> StoreResult<ResultSet> {
        let mut keyspaces = self.db.keyspaces.write();
        let applied = match statement {
            Statement::CreateKeyspace { keyspace } => {
                if keyspaces.contains_key(keyspace) {
                    false
                } else {
                    keyspaces.insert(keyspace.clone(), BTreeMap::new());
                    true
                }
            }
            Statement::DropKeyspace { keyspace } => keyspaces.remove(keyspace).is_some(),
            Statement::CreateTable {
                keyspace,
                table,
                comment,
                vector_dimension,
            } => {
                let tables = keyspaces
                    .get_mut(keyspace)
                    .ok_or_else(|| StoreError::KeyspaceNotFound(keyspace.clone()))?;
                if tables.contains_key(table) {
                    false
                } else {
                    tables.insert(
                        table.clone(),
                        Arc::new(MemoryTable::new(table.clone(), comment.clone(), *vector_dimension)),
                    );
                    true
                }
            }
            Statement::DropTable { keyspace, table } => keyspaces
                .get_mut(keyspace)
                .ok_or_else(|| StoreError::KeyspaceNotFound(keyspace.clone()))?
                .remove(table)
                .is_some(),
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "'{}' is not a schema statement",
                    other.kind()
                )))
            }
        };
        debug!(target: "tessera::store", kind = statement.kind(), applied, "schema statement");
        Ok(ResultSet {
            applied,
            ..Default::default()
        })
    }
}

impl StoreSession for MemorySession {
    fn execute(&self, statement: &Statement) -> StoreResult<ResultSet> {
        self.check_alive()?;
        match statement {
            Statement::CreateKeyspace { .. }
            | Statement::DropKeyspace { .. }
            | Statement::CreateTable { .. }
            | Statement::DropTable { .. } => self.execute_schema(statement),
            Statement::CreateIndex {
                keyspace,
                table,
                index,
            } => {
                let applied = self.db.table(keyspace, table)?.create_index(index.clone())?;
                Ok(ResultSet {
                    applied,
                    ..Default::default()
                })
            }
            Statement::Insert {
                keyspace,
                table,
                row,
                if_not_exists,
            } => self
                .db
                .table(keyspace, table)?
                .insert(row.clone(), *if_not_exists),
            Statement::Update {
                keyspace,
                table,
                row,
                if_tx_id,
            } => self.db.table(keyspace, table)?.update(row.clone(), *if_tx_id),
            Statement::Delete {
                keyspace,
                table,
                key,
                if_tx_id,
            } => self.db.table(keyspace, table)?.delete(key, *if_tx_id),
            Statement::Select(select) => self.db.table(&select.keyspace, &select.table)?.select(select),
        }
    }

    fn keyspaces(&self) -> StoreResult<Vec<String>> {
        self.check_alive()?;
        Ok(self.db.keyspaces.read().keys().cloned().collect())
    }

    fn tables(&self, keyspace: &str) -> StoreResult<Vec<TableMetadata>> {
        self.check_alive()?;
        let keyspaces = self.db.keyspaces.read();
        let tables = keyspaces
            .get(keyspace)
            .ok_or_else(|| StoreError::KeyspaceNotFound(keyspace.to_string()))?;
        Ok(tables.values().map(|t| t.metadata()).collect())
    }
}
