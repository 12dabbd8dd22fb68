//! Command Planner
//!
//! Turns a parsed command and a resolved collection schema into a plan: the
//! base store selection (with pushed-down index predicates), the post-filter,
//! the ordering and the execution strategy. Planning is pure; it never
//! touches the store.

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use tessera_core::{json_type_name, Limits, LEXICAL_FIELD, VECTOR_FIELD};
use tessera_storage::Select;

use crate::catalog::CollectionSchema;
use crate::cursor::CursorIdentity;
use crate::error::{Error, Result};
use crate::filter::{Filter, Pushdown};
use crate::projection::Projection;
use crate::request::{
    CountRequest, DeleteManyRequest, DeleteOneRequest, FindRequest, UpdateOneRequest,
};
use crate::shred::parse_vector;
use crate::update::Update;

/// How a plan is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One statement (inserts, similarity and relevance reads)
    Single,
    /// Read the version, then conditionally write; retried on rejection
    ConditionalRetry,
    /// Key-order scan, resumable through a page state
    PagedScan,
    /// Vector and lexical sub-queries fused by rank
    HybridMerge,
}

impl Strategy {
    /// Tag used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Single => "single",
            Strategy::ConditionalRetry => "conditional-retry",
            Strategy::PagedScan => "paged-scan",
            Strategy::HybridMerge => "hybrid-merge",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a field sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// `1`
    Ascending,
    /// `-1`
    Descending,
}

/// Parsed sort clause.
#[derive(Debug, Clone, PartialEq)]
pub enum SortSpec {
    /// No sort: key order
    Natural,
    /// In-memory sort on document fields
    Fields(Vec<(String, SortDirection)>),
    /// ANN on `$vector`
    Vector(Vec<f32>),
    /// BM25 on `$lexical`
    Lexical(String),
    /// Both, fused
    Hybrid {
        /// Query vector
        vector: Vec<f32>,
        /// Query text
        lexical: String,
    },
}

impl SortSpec {
    /// Whether this is an ANN, BM25 or hybrid sort.
    pub fn is_ranked(&self) -> bool {
        matches!(
            self,
            SortSpec::Vector(_) | SortSpec::Lexical(_) | SortSpec::Hybrid { .. }
        )
    }
}

/// A read, ready to execute.
#[derive(Debug, Clone)]
pub struct ReadPlan {
    /// Target collection
    pub schema: Arc<CollectionSchema>,
    /// Full filter, evaluated over every candidate
    pub filter: Filter,
    /// Part of the filter the store evaluates
    pub pushdown: Pushdown,
    /// Ordering
    pub sort: SortSpec,
    /// Maximum documents in total (across pages for scans)
    pub limit: Option<usize>,
    /// Documents skipped before the first result (field sort only)
    pub skip: usize,
    /// Continuation token
    pub page_state: Option<String>,
    /// Add `$similarity`
    pub include_similarity: bool,
    /// Add `$scores`
    pub include_scores: bool,
    /// Result projection
    pub projection: Projection,
    /// Execution strategy
    pub strategy: Strategy,
    signature: String,
}

impl ReadPlan {
    /// Base selection: the table plus pushed-down predicates.
    pub fn select(&self) -> Select {
        let mut select = Select::from(self.schema.keyspace(), self.schema.table());
        select.predicates = self.pushdown.predicates.clone();
        select
    }

    /// Identity a page state must carry to resume this read.
    pub fn cursor_identity(&self) -> CursorIdentity {
        CursorIdentity {
            namespace: self.schema.namespace.to_string(),
            collection: self.schema.name.to_string(),
            generation: self.schema.generation,
            signature: self.signature.clone(),
        }
    }
}

/// A conditional update or delete, ready to execute.
#[derive(Debug, Clone)]
pub struct WritePlan {
    /// Read choosing the target document(s)
    pub target: ReadPlan,
    /// Update clause (`updateOne` only)
    pub update: Option<Update>,
    /// Insert when nothing matches
    pub upsert: bool,
    /// Always [`Strategy::ConditionalRetry`]
    pub strategy: Strategy,
}

/// Plans commands against a collection schema.
#[derive(Debug, Clone)]
pub struct CommandPlanner {
    limits: Limits,
}

impl CommandPlanner {
    /// Create a planner enforcing `limits`.
    pub fn new(limits: Limits) -> Self {
        CommandPlanner { limits }
    }

    /// Plan `find` (and `findOne`, which arrives with `limit: 1`).
    pub fn plan_find(&self, schema: Arc<CollectionSchema>, request: &FindRequest) -> Result<ReadPlan> {
        let filter = self.plan_filter(&schema, request.filter.as_ref())?;
        let sort = self.plan_sort(&schema, request.sort.as_ref())?;
        let projection = Projection::parse(request.projection.as_ref())?;
        let options = &request.options;

        if options.skip.is_some() && !matches!(sort, SortSpec::Fields(_)) {
            return Err(Error::invalid_request("'skip' requires a sort on document fields"));
        }
        if options.include_similarity
            && !matches!(sort, SortSpec::Vector(_) | SortSpec::Hybrid { .. })
        {
            return Err(Error::invalid_request("'includeSimilarity' requires a '$vector' sort"));
        }
        if options.include_scores && !matches!(sort, SortSpec::Lexical(_) | SortSpec::Hybrid { .. }) {
            return Err(Error::invalid_request(
                "'includeScores' requires a '$lexical' sort",
            ));
        }

        let limit = if sort.is_ranked() {
            if options.page_state.is_some() {
                return Err(Error::invalid_request(
                    "'pageState' cannot be used with a '$vector' or '$lexical' sort",
                ));
            }
            let limit = options.limit.unwrap_or(self.limits.default_page_size);
            if limit > self.limits.max_page_size {
                return Err(Error::invalid_request(format!(
                    "'limit' {} exceeds the maximum of {} for similarity and relevance sorts",
                    limit, self.limits.max_page_size
                )));
            }
            Some(limit)
        } else {
            options.limit
        };

        let strategy = match sort {
            SortSpec::Natural | SortSpec::Fields(_) => Strategy::PagedScan,
            SortSpec::Vector(_) | SortSpec::Lexical(_) => Strategy::Single,
            SortSpec::Hybrid { .. } => Strategy::HybridMerge,
        };
        let signature = signature(request.sort.as_ref(), request.filter.as_ref());
        Ok(ReadPlan {
            pushdown: filter.pushdown(),
            schema,
            filter,
            sort,
            limit,
            skip: options.skip.unwrap_or(0),
            page_state: options.page_state.clone(),
            include_similarity: options.include_similarity,
            include_scores: options.include_scores,
            projection,
            strategy,
            signature,
        })
    }

    /// Plan `countDocuments`.
    pub fn plan_count(&self, schema: Arc<CollectionSchema>, request: &CountRequest) -> Result<ReadPlan> {
        let find = FindRequest {
            filter: request.filter.clone(),
            ..FindRequest::default()
        };
        let mut plan = self.plan_find(schema, &find)?;
        plan.limit = Some(self.limits.max_count);
        Ok(plan)
    }

    /// Plan `updateOne`.
    pub fn plan_update_one(&self, schema: Arc<CollectionSchema>, request: &UpdateOneRequest) -> Result<WritePlan> {
        let update = Update::parse(&request.update)?;
        let target = self.plan_target(schema, request.filter.as_ref(), request.sort.as_ref(), Some(1))?;
        Ok(WritePlan {
            target,
            update: Some(update),
            upsert: request.options.upsert,
            strategy: Strategy::ConditionalRetry,
        })
    }

    /// Plan `deleteOne`.
    pub fn plan_delete_one(&self, schema: Arc<CollectionSchema>, request: &DeleteOneRequest) -> Result<WritePlan> {
        let target = self.plan_target(schema, request.filter.as_ref(), request.sort.as_ref(), Some(1))?;
        Ok(WritePlan {
            target,
            update: None,
            upsert: false,
            strategy: Strategy::ConditionalRetry,
        })
    }

    /// Plan `deleteMany`; one call deletes at most `max_documents_per_delete`.
    pub fn plan_delete_many(&self, schema: Arc<CollectionSchema>, request: &DeleteManyRequest) -> Result<WritePlan> {
        let target = self.plan_target(
            schema,
            request.filter.as_ref(),
            None,
            Some(self.limits.max_documents_per_delete),
        )?;
        Ok(WritePlan {
            target,
            update: None,
            upsert: false,
            strategy: Strategy::ConditionalRetry,
        })
    }

    fn plan_target(
        &self,
        schema: Arc<CollectionSchema>,
        filter: Option<&JsonValue>,
        sort: Option<&JsonValue>,
        limit: Option<usize>,
    ) -> Result<ReadPlan> {
        let find = FindRequest {
            filter: filter.cloned(),
            sort: sort.cloned(),
            projection: Some(serde_json::json!({"*": 1})),
            options: crate::request::FindOptions {
                limit,
                ..Default::default()
            },
        };
        self.plan_find(schema, &find)
    }

    /// Parse a filter and check every path it reads is indexed.
    pub fn plan_filter(&self, schema: &CollectionSchema, raw: Option<&JsonValue>) -> Result<Filter> {
        let filter = Filter::parse(raw, &self.limits)?;
        if let Some(path) = filter
            .paths()
            .into_iter()
            .find(|path| !schema.options.is_indexed(path))
        {
            return Err(Error::UnindexedFilterPath {
                path: path.to_string(),
            });
        }
        Ok(filter)
    }

    /// Parse a sort clause against the collection's configuration.
    pub fn plan_sort(&self, schema: &CollectionSchema, raw: Option<&JsonValue>) -> Result<SortSpec> {
        let clause = match raw {
            None | Some(JsonValue::Null) => return Ok(SortSpec::Natural),
            Some(JsonValue::Object(clause)) => clause,
            Some(other) => {
                return Err(Error::invalid_sort(format!(
                    "sort must be an object, got {}",
                    json_type_name(other)
                )))
            }
        };

        let vector = match clause.get(VECTOR_FIELD) {
            Some(raw) => Some(self.vector_sort(schema, raw)?),
            None => None,
        };
        let lexical = match clause.get(LEXICAL_FIELD) {
            Some(raw) => Some(self.lexical_sort(schema, raw)?),
            None => None,
        };
        let ranked = vector.is_some() as usize + lexical.is_some() as usize;
        if ranked > 0 && clause.len() != ranked {
            return Err(Error::invalid_sort(
                "'$vector' and '$lexical' sorts cannot be combined with field sorts",
            ));
        }
        match (vector, lexical) {
            (Some(vector), Some(lexical)) => return Ok(SortSpec::Hybrid { vector, lexical }),
            (Some(vector), None) => return Ok(SortSpec::Vector(vector)),
            (None, Some(lexical)) => return Ok(SortSpec::Lexical(lexical)),
            (None, None) => {}
        }

        let mut fields = Vec::with_capacity(clause.len());
        for (path, direction) in clause {
            if path.starts_with('$') || path.split('.').any(str::is_empty) {
                return Err(Error::invalid_sort(format!("invalid sort path '{}'", path)));
            }
            let direction = match direction.as_i64() {
                Some(1) => SortDirection::Ascending,
                Some(-1) => SortDirection::Descending,
                _ => {
                    return Err(Error::invalid_sort(format!(
                        "sort direction for '{}' must be 1 or -1",
                        path
                    )))
                }
            };
            if !schema.options.is_indexed(path) {
                return Err(Error::UnindexedSortPath { path: path.clone() });
            }
            fields.push((path.clone(), direction));
        }
        if fields.is_empty() {
            return Ok(SortSpec::Natural);
        }
        Ok(SortSpec::Fields(fields))
    }

    fn vector_sort(&self, schema: &CollectionSchema, raw: &JsonValue) -> Result<Vec<f32>> {
        let Some(expected) = schema.vector_dimension() else {
            return Err(Error::VectorNotEnabled {
                collection: schema.name.to_string(),
            });
        };
        let vector = parse_vector(raw).map_err(|e| match e {
            Error::InvalidRequest { reason } => Error::invalid_sort(reason),
            other => other,
        })?;
        if vector.len() != expected {
            return Err(Error::VectorDimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    fn lexical_sort(&self, schema: &CollectionSchema, raw: &JsonValue) -> Result<String> {
        if schema.options.lexical().is_none() {
            return Err(Error::LexicalNotEnabled {
                collection: schema.name.to_string(),
            });
        }
        match raw {
            JsonValue::String(text) if !text.trim().is_empty() => Ok(text.clone()),
            _ => Err(Error::invalid_sort("'$lexical' sort requires non-empty text")),
        }
    }
}

fn signature(sort: Option<&JsonValue>, filter: Option<&JsonValue>) -> String {
    let text = |v: Option<&JsonValue>| v.map(JsonValue::to_string).unwrap_or_default();
    format!("{}|{}", text(sort), text(filter))
}
