//! Concurrency Controller
//!
//! Updates and deletes are optimistic. Each attempt writes conditionally on
//! the `tx_id` read with the target; the store either applies the write or
//! rejects it and returns the row as it is now. A rejection re-evaluates the
//! filter against that current row and tries again, up to
//! `max_conditional_attempts` writes. An unreachable store is never retried.
//!
//! ```text
//! Start -> ConditionalWriteSent -> Applied
//!                               -> Rejected -> (re-read) -> Start | gone/no match
//!                               -> NodeUnreachable (propagated)
//! ```

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use tessera_core::{DocumentId, Limits, ID_FIELD};
use tessera_storage::{ResultSet, Statement};

use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::planner::{ReadPlan, WritePlan};
use crate::projection::insert_path;
use crate::read::{Candidate, DocumentReader};
use crate::request::{DeleteResult, UpdateResult};
use crate::session::TenantSession;
use crate::shred::Document;
use crate::update::Update;

/// Bounded optimistic retry for conditional writes.
#[derive(Debug, Clone)]
pub struct ConcurrencyController {
    max_attempts: usize,
    limits: Limits,
}

impl ConcurrencyController {
    /// Create a controller allowing `max_attempts` conditional writes per document.
    pub fn new(max_attempts: usize, limits: Limits) -> Self {
        ConcurrencyController {
            max_attempts: max_attempts.max(1),
            limits,
        }
    }

    /// Attempts per document.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Execute `updateOne`.
    pub fn execute_update(
        &self,
        session: &TenantSession,
        reader: &DocumentReader,
        plan: &WritePlan,
    ) -> Result<UpdateResult> {
        let update = plan
            .update
            .as_ref()
            .ok_or_else(|| Error::invalid_request("updateOne requires an update clause"))?;
        let mut target = reader
            .fetch(session, &plan.target, None)?
            .candidates
            .into_iter()
            .next();
        let mut last_id = String::new();

        for attempt in 1..=self.max_attempts {
            let Some(candidate) = target.take() else {
                if !plan.upsert {
                    return Ok(UpdateResult::default());
                }
                match self.try_upsert(session, &plan.target, update)? {
                    Ok(result) => return Ok(result),
                    Err(existing) => {
                        last_id = existing.row.key.clone();
                        if !plan.target.filter.matches(&existing.to_json()) {
                            return Err(Error::DocumentExists {
                                id: display_id(&existing),
                            });
                        }
                        target = Some(existing);
                        continue;
                    }
                }
            };
            last_id = candidate.row.key.clone();

            let mut doc = candidate.doc.clone();
            if !update.apply(&mut doc, false)? {
                return Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: 0,
                    upserted_id: None,
                });
            }
            let row = Document::from_json(JsonValue::Object(doc), &self.limits)?.shred(&plan.target.schema)?;
            let result = session.execute(&Statement::Update {
                keyspace: plan.target.schema.keyspace().to_string(),
                table: plan.target.schema.table().to_string(),
                row,
                if_tx_id: candidate.row.tx_id,
            })?;
            if result.applied {
                debug!(target: "tessera::controller", key = %candidate.row.key, attempt, "update applied");
                return Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: 1,
                    upserted_id: None,
                });
            }
            debug!(target: "tessera::controller", key = %candidate.row.key, attempt, "update rejected");
            target = still_matching(result, &plan.target.filter)?;
        }

        warn!(target: "tessera::controller", tenant = %session.tenant(), key = %last_id, attempts = self.max_attempts, "update gave up");
        Err(Error::Contention {
            id: display_key(&last_id),
            attempts: self.max_attempts,
        })
    }

    /// Insert the document an upsert describes. On a lost race, returns the
    /// row that won.
    fn try_upsert(
        &self,
        session: &TenantSession,
        plan: &ReadPlan,
        update: &Update,
    ) -> Result<std::result::Result<UpdateResult, Candidate>> {
        let mut seed = upsert_seed(&plan.filter);
        update.apply(&mut seed, true)?;
        let document = Document::from_json(JsonValue::Object(seed), &self.limits)?;
        let row = document.shred(&plan.schema)?;
        let result = session.execute(&Statement::Insert {
            keyspace: plan.schema.keyspace().to_string(),
            table: plan.schema.table().to_string(),
            row,
            if_not_exists: true,
        })?;
        if result.applied {
            debug!(target: "tessera::controller", id = %document.id, "upserted");
            return Ok(Ok(UpdateResult {
                matched_count: 0,
                modified_count: 0,
                upserted_id: Some(document.id.to_json()),
            }));
        }
        match result.rows.into_iter().next() {
            Some(current) => Ok(Err(Candidate::decode(current)?)),
            None => Err(Error::DocumentExists {
                id: document.id.to_string(),
            }),
        }
    }

    /// Execute `deleteOne`.
    pub fn execute_delete_one(
        &self,
        session: &TenantSession,
        reader: &DocumentReader,
        plan: &WritePlan,
    ) -> Result<DeleteResult> {
        let target = reader
            .fetch(session, &plan.target, None)?
            .candidates
            .into_iter()
            .next();
        let deleted_count = match target {
            Some(candidate) => self.delete_candidate(session, &plan.target, candidate)?,
            None => 0,
        };
        Ok(DeleteResult {
            deleted_count,
            more_data: false,
        })
    }

    /// Execute one round of `deleteMany`: at most one page of matches.
    pub fn execute_delete_many(
        &self,
        session: &TenantSession,
        reader: &DocumentReader,
        plan: &WritePlan,
    ) -> Result<DeleteResult> {
        let fetched = reader.fetch(session, &plan.target, None)?;
        let more_data = fetched.next.is_some() || fetched.truncated;
        let mut deleted_count = 0;
        for candidate in fetched.candidates {
            deleted_count += self.delete_candidate(session, &plan.target, candidate)?;
        }
        debug!(
            target: "tessera::controller",
            tenant = %session.tenant(),
            collection = %plan.target.schema.name,
            deleted_count,
            more_data,
            "delete many"
        );
        Ok(DeleteResult {
            deleted_count,
            more_data,
        })
    }

    /// Delete one document conditionally. Returns 1 if this call deleted it.
    fn delete_candidate(&self, session: &TenantSession, plan: &ReadPlan, candidate: Candidate) -> Result<usize> {
        let mut target = Some(candidate);
        let mut last_id = String::new();
        for attempt in 1..=self.max_attempts {
            let Some(candidate) = target.take() else {
                return Ok(0);
            };
            last_id = candidate.row.key.clone();
            let result = session.execute(&Statement::Delete {
                keyspace: plan.schema.keyspace().to_string(),
                table: plan.schema.table().to_string(),
                key: candidate.row.key.clone(),
                if_tx_id: Some(candidate.row.tx_id),
            })?;
            if result.applied {
                debug!(target: "tessera::controller", key = %candidate.row.key, attempt, "delete applied");
                return Ok(1);
            }
            debug!(target: "tessera::controller", key = %candidate.row.key, attempt, "delete rejected");
            target = still_matching(result, &plan.filter)?;
        }

        warn!(target: "tessera::controller", tenant = %session.tenant(), key = %last_id, attempts = self.max_attempts, "delete gave up");
        Err(Error::Contention {
            id: display_key(&last_id),
            attempts: self.max_attempts,
        })
    }
}

/// The current row from a rejected write, if it still matches.
fn still_matching(result: ResultSet, filter: &Filter) -> Result<Option<Candidate>> {
    match result.rows.into_iter().next() {
        Some(current) => {
            let candidate = Candidate::decode(current)?;
            Ok(filter.matches(&candidate.to_json()).then_some(candidate))
        }
        None => Ok(None),
    }
}

fn display_id(candidate: &Candidate) -> String {
    candidate
        .doc
        .get(ID_FIELD)
        .map(JsonValue::to_string)
        .unwrap_or_else(|| display_key(&candidate.row.key))
}

fn display_key(key: &str) -> String {
    DocumentId::from_storage_key(key)
        .map(|id| id.to_string())
        .unwrap_or_else(|_| key.to_string())
}

/// Starting document for an upsert: the filter's equality conditions.
fn upsert_seed(filter: &Filter) -> Map<String, JsonValue> {
    let mut seed = Map::new();
    for (path, value) in filter.equalities() {
        insert_path(&mut seed, path, value.clone());
    }
    seed
}
