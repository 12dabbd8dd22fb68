//! Rows and statement results

use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::statement::IndexSpec;

/// A shredded document as stored in a collection table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// Primary key (type-tagged document id)
    pub key: String,
    /// Version marker; replaced on every write
    pub tx_id: Uuid,
    /// Serialized document body without reserved fields
    pub doc_json: String,
    /// Every path present in the document
    pub exist_keys: BTreeSet<String>,
    /// Encoded `path value` entries for array elements
    pub array_contains: BTreeSet<String>,
    /// String leaves
    pub text_values: BTreeMap<String, String>,
    /// Numeric leaves
    pub number_values: BTreeMap<String, f64>,
    /// Boolean leaves
    pub bool_values: BTreeMap<String, bool>,
    /// Paths holding `null`
    pub null_values: BTreeSet<String>,
    /// Embedding
    pub vector: Option<Vec<f32>>,
    /// Lexical text
    pub lexical: Option<String>,
}

/// Row plus the ordering score when the select had an ordering
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    /// The row
    pub row: Row,
    /// Similarity (ANN) or relevance (BM25) score
    pub score: Option<f32>,
}

/// Result of executing a statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    /// Selected rows; for a rejected conditional write, the current row if any
    pub rows: Vec<ScoredRow>,
    /// False when a conditional write or IF [NOT] EXISTS did not apply
    pub applied: bool,
    /// Continuation for the next page, if more rows remain
    pub paging_state: Option<Vec<u8>>,
}

impl ResultSet {
    /// Result of a statement that applied with no rows.
    pub fn applied() -> Self {
        ResultSet {
            applied: true,
            ..Default::default()
        }
    }

    /// Result of a statement that did not apply.
    pub fn not_applied(current: Option<Row>) -> Self {
        ResultSet {
            rows: current
                .into_iter()
                .map(|row| ScoredRow { row, score: None })
                .collect(),
            applied: false,
            paging_state: None,
        }
    }

    /// Rows without scores.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows.into_iter().map(|r| r.row).collect()
    }
}

/// Schema metadata for one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    /// Table name
    pub name: String,
    /// Table comment
    pub comment: String,
    /// Vector column dimension
    pub vector_dimension: Option<usize>,
    /// Secondary indexes on the table
    pub indexes: Vec<IndexSpec>,
}
