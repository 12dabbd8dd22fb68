//! Tessera - document command engine over a column-family store
//!
//! Clients send JSON commands (`createCollection`, `insertOne`, `find`,
//! `updateOne`, ...) scoped to a tenant, namespace and collection. Tessera
//! plans them into store statements, runs mutations through bounded
//! conditional-write retry, enforces per-tenant limits and answers with a
//! uniform `{status, data, errors}` envelope.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera::{Engine, EngineConfig, Executor, MemoryCluster, RequestContext, TenantId};
//!
//! let engine = Engine::new(Arc::new(MemoryCluster::new()), EngineConfig::default())?;
//! let executor = Executor::new(Arc::new(engine));
//! let ctx = RequestContext::new(TenantId::new("acme")?);
//! let response = executor.execute_json(&ctx, r#"{"createNamespace": {"name": "app"}}"#);
//! ```
//!
//! # Architecture
//!
//! All commands go through the [`Executor`]. The store sits behind the
//! [`StoreConnector`] trait; [`MemoryCluster`] is the in-process reference
//! store.

// Re-export the public API from tessera-executor
pub use tessera_executor::*;

pub use tessera_core::{CollectionName, CollectionOptions, Limits, NamespaceName, TenantId};
pub use tessera_storage::{MemoryCluster, StoreConnector, StoreSession};
pub use tessera_engine::{HybridConfig, SessionConfig, CONFIG_FILE_NAME};
