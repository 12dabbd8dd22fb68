//! Document command engine for Tessera
//!
//! This crate turns parsed document commands into store statements:
//! - Resource Limiter: per-tenant collection and index quotas, size bounds
//! - Session Registry: one store session per tenant, evicted on total outage
//! - Schema Catalog: collections as tables plus their secondary indexes
//! - Command Planner: filter pushdown, sort strategy, option validation
//! - Concurrency Controller: bounded optimistic retry of conditional writes
//! - Hybrid Search Merger: reciprocal rank fusion of vector and lexical hits
//! - Pagination Cursor Manager: opaque, integrity-checked page states
//!
//! [`Engine`] wires them together; the executor crate sits on top of it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hybrid;
pub mod limiter;
pub mod planner;
pub mod projection;
pub mod read;
pub mod request;
pub mod session;
pub mod shred;
pub mod update;

pub use catalog::{CollectionSchema, DefineOutcome, DropOutcome, SchemaCatalog};
pub use config::{EngineConfig, HybridConfig, SessionConfig, CONFIG_FILE_NAME};
pub use controller::ConcurrencyController;
pub use cursor::{CursorError, CursorIdentity, CursorManager, ScanState};
pub use engine::{CollectionRef, Engine};
pub use error::{Error, ErrorKind, Result};
pub use hybrid::{merge, HybridHit, HybridMerge};
pub use limiter::{ResourceKind, ResourceLimiter};
pub use planner::{CommandPlanner, ReadPlan, SortSpec, Strategy, WritePlan};
pub use request::*;
pub use session::{SessionHealth, SessionRegistry, TenantSession};
