//! Read execution
//!
//! Executes a [`ReadPlan`] against a tenant session. Every strategy follows
//! the same shape: select candidate rows with the pushed-down predicates,
//! rebuild the documents, run the full filter over them, then order and
//! slice. Plain scans resume through the store's paging state; field sorts
//! resume through an offset into the sorted read. Similarity, relevance and
//! hybrid reads return a single page.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use tessera_core::Limits;
use tessera_storage::{Row, RowOrder, ScoredRow, Statement};

use crate::config::HybridConfig;
use crate::cursor::{CursorManager, ScanState};
use crate::error::Result;
use crate::filter::lookup;
use crate::hybrid;
use crate::planner::{ReadPlan, SortDirection, SortSpec};
use crate::request::{CountResult, FindResult};
use crate::session::TenantSession;
use crate::shred::Document;

/// A matching document with its ordering scores.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Stored row (carries the version marker)
    pub row: Row,
    /// Full document as clients see it
    pub doc: Map<String, JsonValue>,
    /// Vector similarity, normalized to `[0, 1]`
    pub similarity: Option<f32>,
    /// BM25 relevance
    pub relevance: Option<f32>,
    /// Fused hybrid score
    pub fused: Option<f32>,
}

impl Candidate {
    pub(crate) fn decode(scored: ScoredRow) -> Result<Candidate> {
        let doc = match Document::from_row(&scored.row)?.to_json() {
            JsonValue::Object(doc) => doc,
            _ => Map::new(),
        };
        Ok(Candidate {
            row: scored.row,
            doc,
            similarity: None,
            relevance: None,
            fused: None,
        })
    }

    pub(crate) fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.doc.clone())
    }
}

/// Candidates of one page and where the next page starts.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    /// Matching documents, in result order
    pub candidates: Vec<Candidate>,
    /// Continuation, if more results remain
    pub next: Option<ScanState>,
    /// The limit cut the result short; more matches may exist
    pub truncated: bool,
}

/// Executes read plans.
#[derive(Debug, Clone)]
pub struct DocumentReader {
    limits: Limits,
    hybrid: HybridConfig,
    cursors: CursorManager,
}

impl DocumentReader {
    /// Create a reader.
    pub fn new(limits: Limits, hybrid: HybridConfig) -> Self {
        DocumentReader {
            limits,
            hybrid,
            cursors: CursorManager,
        }
    }

    /// Execute `find`: one page of projected documents.
    pub fn find(&self, session: &TenantSession, plan: &ReadPlan) -> Result<FindResult> {
        let identity = plan.cursor_identity();
        let state = match &plan.page_state {
            Some(token) => Some(self.cursors.decode(token, &identity)?),
            None => None,
        };
        let fetched = self.fetch(session, plan, state)?;
        let next_page_state = match &fetched.next {
            Some(next) => Some(self.cursors.encode(&identity, next)?),
            None => None,
        };
        debug!(
            target: "tessera::reader",
            tenant = %session.tenant(),
            collection = %plan.schema.name,
            strategy = %plan.strategy,
            returned = fetched.candidates.len(),
            more = next_page_state.is_some(),
            "find"
        );
        let documents = fetched
            .candidates
            .into_iter()
            .map(|candidate| self.render(plan, candidate))
            .collect();
        Ok(FindResult {
            documents,
            next_page_state,
        })
    }

    fn render(&self, plan: &ReadPlan, candidate: Candidate) -> JsonValue {
        let mut out = plan.projection.apply(candidate.doc);
        if plan.include_similarity {
            if let Some(similarity) = candidate.similarity {
                out.insert("$similarity".into(), json!(similarity));
            }
        }
        if plan.include_scores {
            let mut scores = Map::new();
            if let Some(fused) = candidate.fused {
                scores.insert("$hybrid".into(), json!(fused));
            }
            if let Some(similarity) = candidate.similarity {
                scores.insert("$vector".into(), json!(similarity));
            }
            if let Some(relevance) = candidate.relevance {
                scores.insert("$lexical".into(), json!(relevance));
            }
            out.insert("$scores".into(), JsonValue::Object(scores));
        }
        JsonValue::Object(out)
    }

    /// Matching candidates for `plan`, starting at `state`.
    pub fn fetch(
        &self,
        session: &TenantSession,
        plan: &ReadPlan,
        state: Option<ScanState>,
    ) -> Result<Fetched> {
        match &plan.sort {
            SortSpec::Natural => self.scan(session, plan, state.unwrap_or_default()),
            SortSpec::Fields(fields) => self.sorted(session, plan, fields, state),
            SortSpec::Vector(vector) => {
                let limit = self.ranked_limit(plan);
                let mut candidates = self.ranked(session, plan, RowOrder::Ann(vector.clone()), limit)?;
                for c in &mut candidates {
                    c.similarity = c.relevance.take();
                }
                Ok(Fetched {
                    candidates,
                    ..Fetched::default()
                })
            }
            SortSpec::Lexical(text) => {
                let limit = self.ranked_limit(plan);
                let candidates = self.ranked(session, plan, RowOrder::Bm25(text.clone()), limit)?;
                Ok(Fetched {
                    candidates,
                    ..Fetched::default()
                })
            }
            SortSpec::Hybrid { vector, lexical } => self.hybrid(session, plan, vector, lexical),
        }
    }

    /// Count matching documents, up to the plan's limit.
    pub fn count(&self, session: &TenantSession, plan: &ReadPlan) -> Result<CountResult> {
        let cap = plan.limit.unwrap_or(self.limits.max_count);
        let mut count = 0usize;
        let mut paging = None;
        loop {
            let select = plan.select().with_page(self.limits.max_page_size, paging);
            let result = session.execute(&Statement::Select(select))?;
            for scored in result.rows {
                let matches = if plan.pushdown.exact {
                    true
                } else {
                    plan.filter.matches(&Candidate::decode(scored)?.to_json())
                };
                if matches {
                    count += 1;
                    if count > cap {
                        return Ok(CountResult {
                            count: cap,
                            more_data: true,
                        });
                    }
                }
            }
            paging = result.paging_state;
            if paging.is_none() {
                return Ok(CountResult {
                    count,
                    more_data: false,
                });
            }
        }
    }

    fn scan(&self, session: &TenantSession, plan: &ReadPlan, state: ScanState) -> Result<Fetched> {
        let remaining = plan
            .limit
            .map_or(usize::MAX, |limit| limit.saturating_sub(state.offset));
        let wanted = self.limits.default_page_size.min(remaining);
        if wanted == 0 {
            return Ok(Fetched::default());
        }

        let mut candidates = Vec::with_capacity(wanted);
        let mut paging = state.paging_state;
        loop {
            let select = plan.select().with_page(wanted - candidates.len(), paging.take());
            let result = session.execute(&Statement::Select(select))?;
            for scored in result.rows {
                let candidate = Candidate::decode(scored)?;
                if plan.filter.matches(&candidate.to_json()) {
                    candidates.push(candidate);
                }
            }
            paging = result.paging_state;
            if candidates.len() >= wanted || paging.is_none() {
                break;
            }
        }

        let returned = state.offset + candidates.len();
        let exhausted = plan.limit.map_or(false, |limit| returned >= limit);
        let truncated = exhausted && paging.is_some();
        let next = match paging {
            Some(paging_state) if !exhausted => Some(ScanState {
                paging_state: Some(paging_state),
                offset: returned,
            }),
            _ => None,
        };
        Ok(Fetched {
            candidates,
            next,
            truncated,
        })
    }

    fn sorted(
        &self,
        session: &TenantSession,
        plan: &ReadPlan,
        fields: &[(String, SortDirection)],
        state: Option<ScanState>,
    ) -> Result<Fetched> {
        let cap = self.limits.max_sort_read;
        let mut all = Vec::new();
        let mut paging = None;
        loop {
            let select = plan.select().with_page(cap - all.len(), paging);
            let result = session.execute(&Statement::Select(select))?;
            for scored in result.rows {
                let candidate = Candidate::decode(scored)?;
                if plan.filter.matches(&candidate.to_json()) {
                    all.push(candidate);
                }
            }
            paging = result.paging_state;
            if all.len() >= cap || paging.is_none() {
                break;
            }
        }

        all.sort_by(|a, b| {
            fields
                .iter()
                .map(|(path, direction)| {
                    let ord = compare_values(a.doc_value(path), b.doc_value(path));
                    match direction {
                        SortDirection::Ascending => ord,
                        SortDirection::Descending => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.row.key.cmp(&b.row.key))
        });

        let start = state.map_or(plan.skip, |s| s.offset).min(all.len());
        let end = plan
            .limit
            .map_or(all.len(), |limit| plan.skip.saturating_add(limit))
            .min(all.len());
        let page_end = start.saturating_add(self.limits.default_page_size).min(end).max(start);
        let next = (page_end < end).then(|| ScanState {
            paging_state: None,
            offset: page_end,
        });
        let truncated = end < all.len();
        let candidates = all.drain(start..page_end).collect();
        Ok(Fetched {
            candidates,
            next,
            truncated,
        })
    }

    fn ranked_limit(&self, plan: &ReadPlan) -> usize {
        plan.limit.unwrap_or(self.limits.default_page_size)
    }

    /// One ANN or BM25 query; the store's score lands in `relevance`.
    fn ranked(
        &self,
        session: &TenantSession,
        plan: &ReadPlan,
        order: RowOrder,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        // With a post-filter some rows will be dropped; ask for more.
        let fetch = if plan.pushdown.exact {
            limit
        } else {
            self.limits.max_page_size.max(limit)
        };
        let select = plan.select().with_order(order).with_limit(fetch);
        let result = session.execute(&Statement::Select(select))?;
        let mut candidates = Vec::with_capacity(limit.min(result.rows.len()));
        for scored in result.rows {
            let score = scored.score;
            let mut candidate = Candidate::decode(scored)?;
            if plan.filter.matches(&candidate.to_json()) {
                candidate.relevance = score;
                candidates.push(candidate);
                if candidates.len() == limit {
                    break;
                }
            }
        }
        Ok(candidates)
    }

    fn hybrid(
        &self,
        session: &TenantSession,
        plan: &ReadPlan,
        vector: &[f32],
        lexical: &str,
    ) -> Result<Fetched> {
        let limit = self.ranked_limit(plan);
        let per_source = limit.saturating_mul(2).min(self.limits.max_page_size);
        let by_vector = self.ranked(session, plan, RowOrder::Ann(vector.to_vec()), per_source)?;
        let by_text = self.ranked(session, plan, RowOrder::Bm25(lexical.to_string()), per_source)?;

        let mut pool: HashMap<String, Candidate> = HashMap::new();
        let mut vector_ranking = Vec::with_capacity(by_vector.len());
        for mut candidate in by_vector {
            candidate.similarity = candidate.relevance.take();
            vector_ranking.push((candidate.row.key.clone(), ()));
            pool.insert(candidate.row.key.clone(), candidate);
        }
        let mut lexical_ranking = Vec::with_capacity(by_text.len());
        for candidate in by_text {
            lexical_ranking.push((candidate.row.key.clone(), ()));
            match pool.get_mut(&candidate.row.key) {
                Some(existing) => existing.relevance = candidate.relevance,
                None => {
                    pool.insert(candidate.row.key.clone(), candidate);
                }
            }
        }

        let candidates = hybrid::merge(vector_ranking, lexical_ranking, limit, &self.hybrid)
            .filter_map(|hit| {
                pool.remove(&hit.key).map(|mut candidate| {
                    candidate.fused = Some(hit.score);
                    candidate
                })
            })
            .collect();
        Ok(Fetched {
            candidates,
            ..Fetched::default()
        })
    }
}

impl Candidate {
    fn doc_value(&self, path: &str) -> Option<&JsonValue> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let value = self.doc.get(head)?;
        match rest {
            Some(rest) => lookup(value, rest),
            None => Some(value),
        }
    }
}

fn type_rank(value: Option<&JsonValue>) -> u8 {
    match value {
        None => 0,
        Some(JsonValue::Null) => 1,
        Some(JsonValue::Number(_)) => 2,
        Some(JsonValue::String(_)) => 3,
        Some(JsonValue::Bool(_)) => 4,
        Some(JsonValue::Array(_)) => 5,
        Some(JsonValue::Object(_)) => 6,
    }
}

/// Total order used by field sorts: missing < null < numbers < strings <
/// booleans < arrays < objects.
pub fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        (Some(JsonValue::Array(x)), Some(JsonValue::Array(y))) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(Some(l), Some(r)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Some(JsonValue::Object(x)), Some(JsonValue::Object(y))) => serde_json::to_string(x)
            .unwrap_or_default()
            .cmp(&serde_json::to_string(y).unwrap_or_default()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
