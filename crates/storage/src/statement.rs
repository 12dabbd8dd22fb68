//! Store statements
//!
//! A statement is the unit the engine hands to a [`StoreSession`](crate::StoreSession).
//! Writes carry their condition inline; a conditional write either applies
//! or reports the current row, never both.

use tessera_core::SimilarityMetric;
use uuid::Uuid;

use crate::row::Row;

/// Comparison operator for numeric index lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
}

impl CmpOp {
    /// Evaluate `lhs <op> rhs`.
    pub fn eval(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Lte => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Gte => lhs >= rhs,
        }
    }
}

/// Predicate over a shredded column.
///
/// Every variant except the key lookups needs the matching secondary index.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnPredicate {
    /// Primary key equality
    KeyEq(String),
    /// Primary key membership
    KeyIn(Vec<String>),
    /// `exist_keys CONTAINS path`
    Exists(String),
    /// `query_text_values[path] = value`
    TextEq {
        /// Dotted document path
        path: String,
        /// Expected text
        value: String,
    },
    /// `query_dbl_values[path] <op> value`
    NumberCmp {
        /// Dotted document path
        path: String,
        /// Operator
        op: CmpOp,
        /// Operand
        value: f64,
    },
    /// `query_dbl_values[path] = value`
    NumberEq {
        /// Dotted document path
        path: String,
        /// Expected number
        value: f64,
    },
    /// `query_bool_values[path] = value`
    BoolEq {
        /// Dotted document path
        path: String,
        /// Expected boolean
        value: bool,
    },
    /// `query_null_values CONTAINS path`
    IsNull(String),
    /// `array_contains CONTAINS entry` (entry is the encoded path/value pair)
    ArrayContains(String),
    /// Disjunction of predicates
    AnyOf(Vec<ColumnPredicate>),
}

impl ColumnPredicate {
    /// Index this predicate needs, if any.
    pub fn required_index(&self) -> Option<IndexTarget> {
        match self {
            ColumnPredicate::KeyEq(_) | ColumnPredicate::KeyIn(_) => None,
            ColumnPredicate::Exists(_) => Some(IndexTarget::ExistKeys),
            ColumnPredicate::TextEq { .. } => Some(IndexTarget::TextValues),
            ColumnPredicate::NumberCmp { .. } | ColumnPredicate::NumberEq { .. } => {
                Some(IndexTarget::NumberValues)
            }
            ColumnPredicate::BoolEq { .. } => Some(IndexTarget::BoolValues),
            ColumnPredicate::IsNull(_) => Some(IndexTarget::NullValues),
            ColumnPredicate::ArrayContains(_) => Some(IndexTarget::ArrayContains),
            ColumnPredicate::AnyOf(_) => None,
        }
    }
}

/// Ordering for similarity and relevance queries
#[derive(Debug, Clone, PartialEq)]
pub enum RowOrder {
    /// `ORDER BY query_vector_value ANN OF vector`
    Ann(Vec<f32>),
    /// `ORDER BY query_lexical_value BM25 OF query`
    Bm25(String),
}

/// Column covered by a secondary index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexTarget {
    /// `exist_keys`
    ExistKeys,
    /// `array_contains`
    ArrayContains,
    /// `query_text_values`
    TextValues,
    /// `query_dbl_values`
    NumberValues,
    /// `query_bool_values`
    BoolValues,
    /// `query_null_values`
    NullValues,
    /// `query_vector_value` with a similarity function
    Vector(SimilarityMetric),
    /// `query_lexical_value` with an analyzer
    Lexical(String),
}

impl IndexTarget {
    /// Suffix used when naming the index.
    pub fn suffix(&self) -> &'static str {
        match self {
            IndexTarget::ExistKeys => "exists_keys",
            IndexTarget::ArrayContains => "array_contains",
            IndexTarget::TextValues => "query_text_values",
            IndexTarget::NumberValues => "query_dbl_values",
            IndexTarget::BoolValues => "query_bool_values",
            IndexTarget::NullValues => "query_null_values",
            IndexTarget::Vector(_) => "query_vector_value",
            IndexTarget::Lexical(_) => "query_lexical_value",
        }
    }

    /// Whether two targets index the same column.
    pub fn same_column(&self, other: &IndexTarget) -> bool {
        self.suffix() == other.suffix()
    }
}

/// Secondary index definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    /// Index name, unique within the keyspace
    pub name: String,
    /// Indexed column
    pub target: IndexTarget,
}

impl IndexSpec {
    /// Conventional name: `<table>_<column>`.
    pub fn for_table(table: &str, target: IndexTarget) -> Self {
        IndexSpec {
            name: format!("{}_{}", table, target.suffix()),
            target,
        }
    }
}

/// Row selection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    /// Keyspace
    pub keyspace: String,
    /// Table
    pub table: String,
    /// Conjunctive predicates
    pub predicates: Vec<ColumnPredicate>,
    /// Similarity/relevance ordering; `None` scans in key order
    pub order: Option<RowOrder>,
    /// Total row cap
    pub limit: Option<usize>,
    /// Rows per page for key-order scans
    pub page_size: Option<usize>,
    /// Continuation from a previous page
    pub paging_state: Option<Vec<u8>>,
}

impl Select {
    /// Select everything from a table.
    pub fn from(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Select {
            keyspace: keyspace.into(),
            table: table.into(),
            ..Default::default()
        }
    }

    /// Add a predicate.
    pub fn with_predicate(mut self, predicate: ColumnPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Set ordering.
    pub fn with_order(mut self, order: RowOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Set total row cap.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set page size and continuation.
    pub fn with_page(mut self, page_size: usize, paging_state: Option<Vec<u8>>) -> Self {
        self.page_size = Some(page_size);
        self.paging_state = paging_state;
        self
    }
}

/// Statement executed by a store session
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE KEYSPACE [IF NOT EXISTS]`
    CreateKeyspace {
        /// Keyspace name
        keyspace: String,
    },
    /// `DROP KEYSPACE IF EXISTS`
    DropKeyspace {
        /// Keyspace name
        keyspace: String,
    },
    /// `CREATE TABLE IF NOT EXISTS`; `applied` is false if it already existed
    CreateTable {
        /// Keyspace
        keyspace: String,
        /// Table
        table: String,
        /// Table comment (collection options live here)
        comment: String,
        /// Dimension of the vector column, if any
        vector_dimension: Option<usize>,
    },
    /// `DROP TABLE IF EXISTS`; `applied` is false if it did not exist
    DropTable {
        /// Keyspace
        keyspace: String,
        /// Table
        table: String,
    },
    /// `CREATE CUSTOM INDEX IF NOT EXISTS`
    CreateIndex {
        /// Keyspace
        keyspace: String,
        /// Table
        table: String,
        /// Index definition
        index: IndexSpec,
    },
    /// `INSERT ... [IF NOT EXISTS]`
    Insert {
        /// Keyspace
        keyspace: String,
        /// Table
        table: String,
        /// Row to write
        row: Row,
        /// Apply only if no row with this key exists
        if_not_exists: bool,
    },
    /// `UPDATE ... IF tx_id = ?`: replace a row whose marker still matches
    Update {
        /// Keyspace
        keyspace: String,
        /// Table
        table: String,
        /// Replacement row (same key)
        row: Row,
        /// Expected current `tx_id`
        if_tx_id: Uuid,
    },
    /// `DELETE ... [IF tx_id = ?]`
    Delete {
        /// Keyspace
        keyspace: String,
        /// Table
        table: String,
        /// Primary key
        key: String,
        /// Expected current `tx_id`
        if_tx_id: Option<Uuid>,
    },
    /// `SELECT`
    Select(Select),
}

impl Statement {
    /// Whether the statement carries a server-checked condition.
    pub fn is_conditional(&self) -> bool {
        match self {
            Statement::Insert { if_not_exists, .. } => *if_not_exists,
            Statement::Update { .. } => true,
            Statement::Delete { if_tx_id, .. } => if_tx_id.is_some(),
            _ => false,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateKeyspace { .. } => "create_keyspace",
            Statement::DropKeyspace { .. } => "drop_keyspace",
            Statement::CreateTable { .. } => "create_table",
            Statement::DropTable { .. } => "drop_table",
            Statement::CreateIndex { .. } => "create_index",
            Statement::Insert { .. } => "insert",
            Statement::Update { .. } => "update",
            Statement::Delete { .. } => "delete",
            Statement::Select(_) => "select",
        }
    }
}
