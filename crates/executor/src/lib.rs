//! # Tessera Executor
//!
//! JSON command layer of Tessera. It provides:
//! - [`Command`]: the closed set of commands, parsed from request bodies
//! - [`Executor`]: size check, parse, dispatch to the engine, render
//! - [`CommandResponse`]: the `{status, data, errors}` envelope
//!
//! ## Quick Start
//!
//! ```text
//! use tessera_executor::{Executor, RequestContext};
//!
//! let executor = Executor::new(Arc::new(engine));
//! let ctx = RequestContext::new(tenant).with_namespace(ns).with_collection(users);
//! let response = executor.execute_json(&ctx, r#"{"insertOne": {"document": {"name": "Ada"}}}"#);
//! ```

#![warn(missing_docs)]

mod command;
mod context;
mod error;
mod executor;
mod output;
mod providers;

// Test modules
#[cfg(test)]
mod tests;

// =============================================================================
// Public API
// =============================================================================

pub use command::{Command, EmptyRequest, Scope, COMMAND_NAMES};
pub use context::RequestContext;
pub use error::{Error, ErrorEntry};
pub use executor::Executor;
pub use output::{CommandResponse, Output};
pub use providers::{RERANKING_PROVIDERS, VECTOR_PROVIDERS};

// Re-export engine types so users don't need tessera-engine directly
pub use tessera_engine::{CollectionRef, Engine, EngineConfig, ErrorKind};

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, Error>;
