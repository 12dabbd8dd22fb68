//! Resource Limiter
//!
//! Per-tenant collection and index counters, checked before any schema
//! element is created. Counters are seeded from store metadata the first time
//! a tenant needs them and dropped when the tenant's session is evicted, so
//! they always start from the true live counts.
//!
//! A successful check hands out a [`Reservation`]. Confirming it keeps the
//! increment; dropping it unconfirmed gives the capacity back, so a creation
//! that fails half way never leaks quota.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use tessera_core::{Limits, TenantId};
use tessera_storage::StoreSession;

use crate::error::{Error, Result};

/// What a reservation counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Collections (tables)
    Collection,
    /// Store indexes
    Index,
}

/// Live counts for one tenant database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Collections
    pub collections: usize,
    /// Indexes
    pub indexes: usize,
}

impl Usage {
    /// Count every table and index across the tenant's keyspaces.
    pub fn from_store(store: &dyn StoreSession) -> Result<Self> {
        let mut usage = Usage::default();
        for keyspace in store.keyspaces()? {
            for table in store.tables(&keyspace)? {
                usage.collections += 1;
                usage.indexes += table.indexes.len();
            }
        }
        Ok(usage)
    }

    fn get(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Collection => self.collections,
            ResourceKind::Index => self.indexes,
        }
    }

    fn get_mut(&mut self, kind: ResourceKind) -> &mut usize {
        match kind {
            ResourceKind::Collection => &mut self.collections,
            ResourceKind::Index => &mut self.indexes,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    usage: Option<Usage>,
    // Bumped on every seed and invalidation so stale reservations and
    // releases do not touch fresh counts.
    generation: u64,
}

/// Per-tenant quota enforcement.
pub struct ResourceLimiter {
    limits: Limits,
    tenants: DashMap<TenantId, Arc<Mutex<Counters>>>,
}

impl ResourceLimiter {
    /// Create a limiter enforcing `limits`.
    pub fn new(limits: Limits) -> Self {
        ResourceLimiter {
            limits,
            tenants: DashMap::new(),
        }
    }

    /// Configured limits.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Reject a raw request body over `max_request_bytes`.
    pub fn check_request_size(&self, len: usize) -> Result<()> {
        self.limits.check_request_size(len).map_err(Error::from)
    }

    fn slot(&self, tenant: &TenantId) -> Arc<Mutex<Counters>> {
        self.tenants.entry(tenant.clone()).or_default().clone()
    }

    fn limit_for(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Collection => self.limits.max_collections,
            ResourceKind::Index => self.limits.max_indexes,
        }
    }

    /// Reserve `delta` units of one resource.
    pub fn try_reserve(
        &self,
        tenant: &TenantId,
        store: &dyn StoreSession,
        kind: ResourceKind,
        delta: usize,
    ) -> Result<Reservation> {
        self.try_reserve_all(tenant, store, &[(kind, delta)])
    }

    /// Reserve several resources at once; all or nothing.
    ///
    /// Check and increment happen under the tenant's counter lock. A denial
    /// leaves the counters untouched.
    pub fn try_reserve_all(
        &self,
        tenant: &TenantId,
        store: &dyn StoreSession,
        deltas: &[(ResourceKind, usize)],
    ) -> Result<Reservation> {
        let slot = self.slot(tenant);
        let mut counters = slot.lock();
        let mut usage = match counters.usage {
            Some(usage) => usage,
            None => {
                let seeded = Usage::from_store(store)?;
                debug!(target: "tessera::limiter", tenant = %tenant, ?seeded, "seeded counters");
                counters.usage = Some(seeded);
                counters.generation += 1;
                seeded
            }
        };

        for &(kind, delta) in deltas {
            let current = usage.get(kind);
            let limit = self.limit_for(kind);
            if current + delta > limit {
                debug!(target: "tessera::limiter", tenant = %tenant, ?kind, current, delta, limit, "reservation denied");
                return Err(match kind {
                    ResourceKind::Collection => Error::TooManyCollections { current, limit },
                    ResourceKind::Index => Error::TooManyIndexes {
                        current,
                        requested: delta,
                        limit,
                    },
                });
            }
        }
        for &(kind, delta) in deltas {
            *usage.get_mut(kind) += delta;
        }
        counters.usage = Some(usage);

        Ok(Reservation {
            slot: Arc::clone(&slot),
            generation: counters.generation,
            deltas: deltas.to_vec(),
            confirmed: false,
        })
    }

    /// Token identifying the counts currently held for `tenant`.
    ///
    /// Read it before dropping from the store and hand it to
    /// [`ResourceLimiter::release`]; counts seeded after the token was taken
    /// already reflect the drop.
    pub fn generation(&self, tenant: &TenantId) -> u64 {
        self.tenants
            .get(tenant)
            .map(|slot| slot.lock().generation)
            .unwrap_or_default()
    }

    /// Give back capacity after a collection is dropped.
    ///
    /// Does nothing when the counters were reseeded since `generation`.
    pub fn release(&self, tenant: &TenantId, generation: u64, deltas: &[(ResourceKind, usize)]) {
        let Some(slot) = self.tenants.get(tenant).map(|s| Arc::clone(&s)) else {
            return;
        };
        let mut counters = slot.lock();
        if counters.generation != generation {
            debug!(target: "tessera::limiter", tenant = %tenant, generation, current = counters.generation, "stale release skipped");
            return;
        }
        if let Some(usage) = counters.usage.as_mut() {
            for &(kind, delta) in deltas {
                let count = usage.get_mut(kind);
                *count = count.saturating_sub(delta);
            }
        }
    }

    /// Forget a tenant's counters; the next reservation reseeds them.
    pub fn invalidate(&self, tenant: &TenantId) {
        if let Some(slot) = self.tenants.get(tenant).map(|s| Arc::clone(&s)) {
            let mut counters = slot.lock();
            counters.usage = None;
            counters.generation += 1;
            debug!(target: "tessera::limiter", tenant = %tenant, "counters invalidated");
        }
    }

    /// Current counts, if seeded.
    pub fn usage(&self, tenant: &TenantId) -> Option<Usage> {
        self.tenants.get(tenant).and_then(|slot| slot.lock().usage)
    }
}

/// Capacity held for an in-progress creation.
///
/// Dropped without [`Reservation::confirm`], the capacity is released.
#[must_use = "dropping a reservation releases it"]
pub struct Reservation {
    slot: Arc<Mutex<Counters>>,
    generation: u64,
    deltas: Vec<(ResourceKind, usize)>,
    confirmed: bool,
}

impl Reservation {
    /// Keep the reserved capacity.
    pub fn confirm(mut self) {
        self.confirmed = true;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.confirmed {
            return;
        }
        let mut counters = self.slot.lock();
        if counters.generation != self.generation {
            return;
        }
        if let Some(usage) = counters.usage.as_mut() {
            for &(kind, delta) in &self.deltas {
                let count = usage.get_mut(kind);
                *count = count.saturating_sub(delta);
            }
        }
    }
}
