//! Driver-facing traits
//!
//! A [`StoreConnector`] opens sessions; a [`StoreSession`] is one logical
//! connection, safe for concurrent use. The engine never assumes anything
//! else about the driver.

use std::sync::Arc;

use tessera_core::TenantId;

use crate::error::StoreResult;
use crate::row::{ResultSet, TableMetadata};
use crate::statement::Statement;

/// One logical connection to the store for a tenant database.
pub trait StoreSession: Send + Sync {
    /// Execute a statement.
    fn execute(&self, statement: &Statement) -> StoreResult<ResultSet>;

    /// Names of all keyspaces.
    fn keyspaces(&self) -> StoreResult<Vec<String>>;

    /// Tables (with indexes) in a keyspace.
    fn tables(&self, keyspace: &str) -> StoreResult<Vec<TableMetadata>>;
}

/// Opens sessions to tenant databases.
pub trait StoreConnector: Send + Sync {
    /// Connect to the tenant's database.
    ///
    /// Fails with [`StoreError::AllNodesFailed`](crate::StoreError::AllNodesFailed)
    /// when the store is unreachable.
    fn connect(&self, tenant: &TenantId) -> StoreResult<Arc<dyn StoreSession>>;
}
