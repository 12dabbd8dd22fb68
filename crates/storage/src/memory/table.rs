//! One in-memory table
//!
//! Rows live in a key-ordered map behind a single lock, so every conditional
//! write is checked and applied atomically: at most one writer wins a given
//! `tx_id` condition.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::{StoreError, StoreResult};
use crate::row::{ResultSet, Row, ScoredRow, TableMetadata};
use crate::scorer::{similarity, Bm25Scorer};
use crate::statement::{ColumnPredicate, IndexSpec, IndexTarget, RowOrder, Select};
use crate::tokenizer::Analyzer;

pub(crate) struct MemoryTable {
    name: String,
    comment: String,
    vector_dimension: Option<usize>,
    indexes: RwLock<Vec<IndexSpec>>,
    rows: RwLock<BTreeMap<String, Row>>,
}

impl MemoryTable {
    pub(crate) fn new(name: String, comment: String, vector_dimension: Option<usize>) -> Self {
        MemoryTable {
            name,
            comment,
            vector_dimension,
            indexes: RwLock::new(Vec::new()),
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    pub(crate) fn metadata(&self) -> TableMetadata {
        TableMetadata {
            name: self.name.clone(),
            comment: self.comment.clone(),
            vector_dimension: self.vector_dimension,
            indexes: self.indexes.read().clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn has_index_named(&self, name: &str) -> bool {
        self.indexes.read().iter().any(|i| i.name == name)
    }

    /// Returns false if an index with this name already exists.
    pub(crate) fn create_index(&self, index: IndexSpec) -> StoreResult<bool> {
        match &index.target {
            IndexTarget::Vector(_) if self.vector_dimension.is_none() => {
                return Err(StoreError::InvalidQuery(format!(
                    "table '{}' has no vector column",
                    self.name
                )));
            }
            IndexTarget::Lexical(analyzer) => {
                analyzer.parse::<Analyzer>()?;
            }
            _ => {}
        }
        let mut indexes = self.indexes.write();
        if indexes.iter().any(|i| i.name == index.name) {
            return Ok(false);
        }
        indexes.push(index);
        Ok(true)
    }

    fn index_for(&self, probe: &IndexTarget) -> Option<IndexTarget> {
        self.indexes
            .read()
            .iter()
            .find(|i| i.target.same_column(probe))
            .map(|i| i.target.clone())
    }

    fn check_row(&self, row: &Row) -> StoreResult<()> {
        if let Some(vector) = &row.vector {
            match self.vector_dimension {
                None => {
                    return Err(StoreError::InvalidQuery(format!(
                        "table '{}' has no vector column",
                        self.name
                    )))
                }
                Some(dim) if dim != vector.len() => {
                    return Err(StoreError::InvalidQuery(format!(
                        "vector dimension {} does not match column dimension {}",
                        vector.len(),
                        dim
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub(crate) fn insert(&self, row: Row, if_not_exists: bool) -> StoreResult<ResultSet> {
        self.check_row(&row)?;
        let mut rows = self.rows.write();
        if if_not_exists {
            if let Some(existing) = rows.get(&row.key) {
                return Ok(ResultSet::not_applied(Some(existing.clone())));
            }
        }
        rows.insert(row.key.clone(), row);
        Ok(ResultSet::applied())
    }

    pub(crate) fn update(&self, row: Row, if_tx_id: uuid::Uuid) -> StoreResult<ResultSet> {
        self.check_row(&row)?;
        let mut rows = self.rows.write();
        let current = rows.get(&row.key).map(|r| r.tx_id);
        if current == Some(if_tx_id) {
            rows.insert(row.key.clone(), row);
            return Ok(ResultSet::applied());
        }
        Ok(ResultSet::not_applied(rows.get(&row.key).cloned()))
    }

    pub(crate) fn delete(&self, key: &str, if_tx_id: Option<uuid::Uuid>) -> StoreResult<ResultSet> {
        let mut rows = self.rows.write();
        match if_tx_id {
            None => {
                rows.remove(key);
                Ok(ResultSet::applied())
            }
            Some(expected) => {
                if rows.get(key).map(|r| r.tx_id) == Some(expected) {
                    rows.remove(key);
                    return Ok(ResultSet::applied());
                }
                Ok(ResultSet::not_applied(rows.get(key).cloned()))
            }
        }
    }

    fn check_predicate_indexes(&self, predicates: &[ColumnPredicate]) -> StoreResult<()> {
        for predicate in predicates {
            if let ColumnPredicate::AnyOf(inner) = predicate {
                self.check_predicate_indexes(inner)?;
                continue;
            }
            if let Some(target) = predicate.required_index() {
                if self.index_for(&target).is_none() {
                    return Err(StoreError::InvalidQuery(format!(
                        "predicate on '{}' of table '{}' requires a secondary index",
                        target.suffix(),
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn select(&self, select: &Select) -> StoreResult<ResultSet> {
        self.check_predicate_indexes(&select.predicates)?;
        match &select.order {
            None => self.scan(select),
            Some(RowOrder::Ann(vector)) => self.ann(select, vector),
            Some(RowOrder::Bm25(query)) => self.bm25(select, query),
        }
    }

    fn scan(&self, select: &Select) -> StoreResult<ResultSet> {
        let start = match &select.paging_state {
            Some(state) => {
                let key = std::str::from_utf8(state).map_err(|_| StoreError::InvalidPagingState)?;
                Bound::Excluded(key.to_string())
            }
            None => Bound::Unbounded,
        };
        let cap = match (select.page_size, select.limit) {
            (Some(p), Some(l)) => p.min(l),
            (Some(p), None) => p,
            (None, Some(l)) => l,
            (None, None) => usize::MAX,
        };

        let rows = self.rows.read();
        let mut matching = rows
            .range((start, Bound::Unbounded))
            .map(|(_, row)| row)
            .filter(|row| select.predicates.iter().all(|p| matches(row, p)));

        let mut out = Vec::new();
        for row in matching.by_ref().take(cap) {
            out.push(ScoredRow {
                row: row.clone(),
                score: None,
            });
        }
        // Only key-order pages carry a continuation, and only if rows remain.
        let more = select.page_size.is_some() && matching.next().is_some();
        let paging_state = if more {
            out.last().map(|r| r.row.key.clone().into_bytes())
        } else {
            None
        };
        Ok(ResultSet {
            rows: out,
            applied: true,
            paging_state,
        })
    }

    fn ann(&self, select: &Select, vector: &[f32]) -> StoreResult<ResultSet> {
        let metric = match self.index_for(&IndexTarget::Vector(Default::default())) {
            Some(IndexTarget::Vector(metric)) => metric,
            _ => {
                return Err(StoreError::InvalidQuery(format!(
                    "ANN ordering on table '{}' requires a vector index",
                    self.name
                )))
            }
        };
        if self.vector_dimension != Some(vector.len()) {
            return Err(StoreError::InvalidQuery(format!(
                "query vector dimension {} does not match column dimension {:?}",
                vector.len(),
                self.vector_dimension
            )));
        }

        let rows = self.rows.read();
        let mut scored: Vec<ScoredRow> = rows
            .values()
            .filter(|row| select.predicates.iter().all(|p| matches(row, p)))
            .filter_map(|row| {
                row.vector.as_ref().map(|v| ScoredRow {
                    row: row.clone(),
                    score: Some(similarity(vector, v, metric)),
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.row.key.cmp(&b.row.key))
        });
        if let Some(limit) = select.limit {
            scored.truncate(limit);
        }
        Ok(ResultSet {
            rows: scored,
            applied: true,
            paging_state: None,
        })
    }

    fn bm25(&self, select: &Select, query: &str) -> StoreResult<ResultSet> {
        let analyzer = match self.index_for(&IndexTarget::Lexical(String::new())) {
            Some(IndexTarget::Lexical(name)) => name.parse::<Analyzer>()?,
            _ => {
                return Err(StoreError::InvalidQuery(format!(
                    "BM25 ordering on table '{}' requires a lexical index",
                    self.name
                )))
            }
        };

        let rows = self.rows.read();
        let scorer = Bm25Scorer::build(analyzer, rows.values().filter_map(|r| r.lexical.as_deref()));
        let mut scored: Vec<(ScoredRow, usize)> = rows
            .values()
            .filter(|row| select.predicates.iter().all(|p| matches(row, p)))
            .filter_map(|row| {
                let text = row.lexical.as_deref()?;
                let relevance = scorer.score(text, query)?;
                Some((
                    ScoredRow {
                        row: row.clone(),
                        score: Some(relevance.score),
                    },
                    relevance.overlap,
                ))
            })
            .collect();
        // Score, then term overlap, then key: deterministic for equal scores.
        scored.sort_by(|(a, a_overlap), (b, b_overlap)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b_overlap.cmp(a_overlap))
                .then_with(|| a.row.key.cmp(&b.row.key))
        });
        let mut rows: Vec<ScoredRow> = scored.into_iter().map(|(r, _)| r).collect();
        if let Some(limit) = select.limit {
            rows.truncate(limit);
        }
        Ok(ResultSet {
            rows,
            applied: true,
            paging_state: None,
        })
    }
}

fn matches(row: &Row, predicate: &ColumnPredicate) -> bool {
    match predicate {
        ColumnPredicate::KeyEq(key) => &row.key == key,
        ColumnPredicate::KeyIn(keys) => keys.contains(&row.key),
        ColumnPredicate::Exists(path) => row.exist_keys.contains(path),
        ColumnPredicate::TextEq { path, value } => row.text_values.get(path) == Some(value),
        ColumnPredicate::NumberCmp { path, op, value } => row
            .number_values
            .get(path)
            .map_or(false, |n| op.eval(*n, *value)),
        ColumnPredicate::NumberEq { path, value } => row.number_values.get(path) == Some(value),
        ColumnPredicate::BoolEq { path, value } => row.bool_values.get(path) == Some(value),
        ColumnPredicate::IsNull(path) => row.null_values.contains(path),
        ColumnPredicate::ArrayContains(entry) => row.array_contains.contains(entry),
        ColumnPredicate::AnyOf(inner) => inner.iter().any(|p| matches(row, p)),
    }
}
