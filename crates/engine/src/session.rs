//! Session Registry
//!
//! One logical store connection per tenant. Sessions are created lazily on
//! first use, shared by every command of that tenant, and thrown away as soon
//! as a total-outage error is reported against them. The next command then
//! reconnects; there is no background health check.
//!
//! Creation is single-flighted per tenant: the tenant's slot lock is held
//! across `connect`, so concurrent first commands produce one session. Other
//! tenants use other slots and are never blocked.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use tessera_core::{CollectionName, NamespaceName, TenantId};
use tessera_storage::{ResultSet, Statement, StoreConnector, StoreSession, TableMetadata};

use crate::catalog::CollectionSchema;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::limiter::ResourceLimiter;

/// Health of a tenant session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionHealth {
    /// Usable
    Healthy,
    /// A total outage was observed; about to be evicted
    Degraded(String),
    /// Removed from the registry; never reused
    Evicted,
}

/// A tenant's live connection plus its schema cache.
pub struct TenantSession {
    tenant: TenantId,
    store: Arc<dyn StoreSession>,
    health: RwLock<SessionHealth>,
    last_used: Mutex<Instant>,
    schemas: DashMap<(NamespaceName, CollectionName), Arc<CollectionSchema>>,
}

impl std::fmt::Debug for TenantSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantSession")
            .field("tenant", &self.tenant)
            .field("health", &*self.health.read())
            .finish()
    }
}

impl TenantSession {
    pub(crate) fn new(tenant: TenantId, store: Arc<dyn StoreSession>) -> Self {
        TenantSession {
            tenant,
            store,
            health: RwLock::new(SessionHealth::Healthy),
            last_used: Mutex::new(Instant::now()),
            schemas: DashMap::new(),
        }
    }

    /// Owning tenant.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Underlying store session.
    pub fn store(&self) -> &dyn StoreSession {
        self.store.as_ref()
    }

    /// Current health.
    pub fn health(&self) -> SessionHealth {
        self.health.read().clone()
    }

    /// Whether commands may still use this session.
    pub fn is_usable(&self) -> bool {
        *self.health.read() == SessionHealth::Healthy
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }

    fn degrade(&self, reason: &str) {
        let mut health = self.health.write();
        if *health == SessionHealth::Healthy {
            *health = SessionHealth::Degraded(reason.to_string());
        }
    }

    fn mark_evicted(&self) {
        *self.health.write() = SessionHealth::Evicted;
        self.schemas.clear();
    }

    /// Execute a statement, classifying store errors.
    pub fn execute(&self, statement: &Statement) -> Result<ResultSet> {
        self.store.execute(statement).map_err(Error::from)
    }

    /// Keyspace names.
    pub fn keyspaces(&self) -> Result<Vec<String>> {
        self.store.keyspaces().map_err(Error::from)
    }

    /// Table metadata of a keyspace.
    pub fn tables(&self, keyspace: &str) -> Result<Vec<TableMetadata>> {
        self.store.tables(keyspace).map_err(Error::from)
    }

    pub(crate) fn cached_schema(
        &self,
        namespace: &NamespaceName,
        collection: &CollectionName,
    ) -> Option<Arc<CollectionSchema>> {
        self.schemas
            .get(&(namespace.clone(), collection.clone()))
            .map(|s| Arc::clone(&s))
    }

    pub(crate) fn cache_schema(&self, schema: Arc<CollectionSchema>) {
        self.schemas
            .insert((schema.namespace.clone(), schema.name.clone()), schema);
    }

    pub(crate) fn forget_schema(&self, namespace: &NamespaceName, collection: &CollectionName) {
        self.schemas.remove(&(namespace.clone(), collection.clone()));
    }

    pub(crate) fn forget_namespace(&self, namespace: &NamespaceName) {
        self.schemas.retain(|(ns, _), _| ns != namespace);
    }
}

type Slot = Arc<Mutex<Option<Arc<TenantSession>>>>;

/// Registry of tenant sessions.
pub struct SessionRegistry {
    connector: Arc<dyn StoreConnector>,
    limiter: Arc<ResourceLimiter>,
    slots: DashMap<TenantId, Slot>,
    idle_ttl: Option<Duration>,
    max_sessions: usize,
    last_sweep: Mutex<Instant>,
}

impl SessionRegistry {
    /// Create a registry opening sessions through `connector`.
    pub fn new(
        connector: Arc<dyn StoreConnector>,
        limiter: Arc<ResourceLimiter>,
        config: &SessionConfig,
    ) -> Self {
        SessionRegistry {
            connector,
            limiter,
            slots: DashMap::new(),
            idle_ttl: config.idle_ttl(),
            max_sessions: config.max_sessions.max(1),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Override the idle timeout (sub-second values are useful in tests).
    pub fn with_idle_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.idle_ttl = ttl;
        self
    }

    fn slot(&self, tenant: &TenantId) -> Slot {
        // Clone the Arc so the map shard is not locked while connecting.
        Arc::clone(&self.slots.entry(tenant.clone()).or_default())
    }

    /// Return the tenant's healthy session, connecting if needed.
    ///
    /// Idempotent and single-flighted: concurrent callers for one tenant get
    /// the same session and cause at most one connect.
    pub fn get_session(&self, tenant: &TenantId) -> Result<Arc<TenantSession>> {
        self.sweep_idle(tenant);

        let slot = self.slot(tenant);
        let mut guard = slot.lock();
        if let Some(session) = guard.as_ref() {
            if session.is_usable() {
                session.touch();
                return Ok(Arc::clone(session));
            }
        }
        if let Some(stale) = guard.take() {
            stale.mark_evicted();
        }

        let store = self.connector.connect(tenant).map_err(|e| {
            warn!(target: "tessera::session", tenant = %tenant, error = %e, "connect failed");
            Error::from(e)
        })?;
        let session = Arc::new(TenantSession::new(tenant.clone(), store));
        *guard = Some(Arc::clone(&session));
        drop(guard);

        info!(target: "tessera::session", tenant = %tenant, "session created");
        self.enforce_capacity(tenant);
        Ok(session)
    }

    /// Report an error observed on `session`.
    ///
    /// A total-outage error degrades the session and evicts it if it is still
    /// the tenant's current one. Returns whether the session was evicted.
    pub fn report_failure(&self, session: &Arc<TenantSession>, cause: &Error) -> bool {
        if !cause.is_unavailable() {
            return false;
        }
        session.degrade(&cause.to_string());

        let tenant = session.tenant().clone();
        let slot = self.slot(&tenant);
        let mut guard = slot.lock();
        let current = guard
            .as_ref()
            .map_or(false, |live| Arc::ptr_eq(live, session));
        if current {
            *guard = None;
        }
        drop(guard);
        session.mark_evicted();

        if current {
            self.limiter.invalidate(&tenant);
            warn!(target: "tessera::session", tenant = %tenant, cause = %cause, "session evicted after outage");
        }
        current
    }

    /// Evict a tenant's session (administrative teardown).
    pub fn evict(&self, tenant: &TenantId) -> bool {
        let Some(slot) = self.slots.get(tenant).map(|s| Arc::clone(&s)) else {
            return false;
        };
        let evicted = slot.lock().take();
        match evicted {
            Some(session) => {
                session.mark_evicted();
                self.limiter.invalidate(tenant);
                info!(target: "tessera::session", tenant = %tenant, "session evicted");
                true
            }
            None => false,
        }
    }

    /// The tenant's current session without connecting.
    pub fn peek(&self, tenant: &TenantId) -> Option<Arc<TenantSession>> {
        let slot = self.slots.get(tenant).map(|s| Arc::clone(&s))?;
        let guard = slot.lock();
        guard.clone()
    }

    /// Number of live sessions.
    pub fn live_sessions(&self) -> usize {
        self.live().len()
    }

    fn live(&self) -> Vec<(TenantId, Arc<TenantSession>)> {
        let slots: Vec<(TenantId, Slot)> = self
            .slots
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        slots
            .into_iter()
            .filter_map(|(tenant, slot)| {
                // A locked slot is mid-connect; skip it rather than wait.
                let guard = slot.try_lock()?;
                guard.clone().map(|s| (tenant, s))
            })
            .collect()
    }

    fn sweep_idle(&self, caller: &TenantId) {
        let Some(ttl) = self.idle_ttl else {
            return;
        };
        {
            let mut last = self.last_sweep.lock();
            if last.elapsed() < ttl / 2 {
                return;
            }
            *last = Instant::now();
        }
        for (tenant, session) in self.live() {
            if &tenant != caller && session.idle_for() >= ttl {
                debug!(target: "tessera::session", tenant = %tenant, "idle session");
                self.evict(&tenant);
            }
        }
    }

    fn enforce_capacity(&self, keep: &TenantId) {
        let mut live = self.live();
        if live.len() <= self.max_sessions {
            return;
        }
        live.retain(|(tenant, _)| tenant != keep);
        // Longest idle first.
        live.sort_by_key(|(_, session)| std::cmp::Reverse(session.idle_for()));
        let excess = live.len() + 1 - self.max_sessions;
        for (tenant, _) in live.into_iter().take(excess) {
            self.evict(&tenant);
        }
    }
}
