//! Column-store boundary for Tessera
//!
//! The engine talks to the store only through the types in this crate:
//! - [`Statement`]: schema, conditional-write and select statements
//! - [`Row`] / [`ResultSet`]: shredded documents and statement results
//! - [`StoreSession`] / [`StoreConnector`]: one logical connection per tenant
//!
//! [`MemoryCluster`] is an in-process store honouring the same contract:
//! single-partition conditional writes, secondary equality indexes, ANN and
//! BM25 orderings, and fault injection for total outages.

#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod row;
pub mod scorer;
pub mod session;
pub mod statement;
pub mod tokenizer;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryCluster, MemorySession};
pub use row::{ResultSet, Row, ScoredRow, TableMetadata};
pub use session::{StoreConnector, StoreSession};
pub use statement::{
    CmpOp, ColumnPredicate, IndexSpec, IndexTarget, RowOrder, Select, Statement,
};
pub use tokenizer::Analyzer;
