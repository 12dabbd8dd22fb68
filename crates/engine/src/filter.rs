//! Filter clauses
//!
//! A filter is parsed once into a [`Filter`] tree. The tree is used twice:
//! the indexable part is pushed down to the store as column predicates, and
//! the whole tree is evaluated again over every returned document. Pushdown
//! only ever narrows the candidate set; the evaluation decides.
//!
//! Supported operators: `$eq`, `$ne`, `$in`, `$nin`, `$gt`, `$gte`, `$lt`,
//! `$lte`, `$exists`, `$all`, `$size`, and the logical `$and` / `$or`.
//! Equality against an array field matches when any element is equal.

use serde_json::{Map, Value as JsonValue};

use tessera_core::{json_type_name, DocumentId, Limits, ID_FIELD, LEXICAL_FIELD, VECTOR_FIELD};
use tessera_storage::{CmpOp, ColumnPredicate};

use crate::error::{Error, Result};
use crate::shred::array_entry;

/// Condition on one path.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `$eq` (also the implicit form `{"path": value}`)
    Eq(JsonValue),
    /// `$ne`
    Ne(JsonValue),
    /// `$in`
    In(Vec<JsonValue>),
    /// `$nin`
    Nin(Vec<JsonValue>),
    /// `$gt`, `$gte`, `$lt`, `$lte` against a number
    Cmp(CmpOp, f64),
    /// `$exists`
    Exists(bool),
    /// `$all`: array contains every value
    All(Vec<JsonValue>),
    /// `$size`: array length
    Size(usize),
}

/// Parsed filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every child matches (empty: matches everything)
    And(Vec<Filter>),
    /// Some child matches
    Or(Vec<Filter>),
    /// A condition on a path
    Field {
        /// Dotted path
        path: String,
        /// Condition
        condition: Condition,
    },
}

/// Predicates the store can evaluate for a filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pushdown {
    /// Conjunctive column predicates
    pub predicates: Vec<ColumnPredicate>,
    /// True when the predicates select exactly the matching documents
    pub exact: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Filter::And(Vec::new())
    }
}

impl Filter {
    /// Parse a filter clause; `None` matches everything.
    pub fn parse(raw: Option<&JsonValue>, limits: &Limits) -> Result<Filter> {
        match raw {
            None | Some(JsonValue::Null) => Ok(Filter::default()),
            Some(JsonValue::Object(clause)) => parse_clause(clause, limits),
            Some(other) => Err(Error::invalid_filter(format!(
                "filter must be an object, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Whether this filter matches every document.
    pub fn is_empty(&self) -> bool {
        matches!(self, Filter::And(children) if children.iter().all(Filter::is_empty))
    }

    /// Evaluate against a full document (including `_id`).
    pub fn matches(&self, doc: &JsonValue) -> bool {
        match self {
            Filter::And(children) => children.iter().all(|c| c.matches(doc)),
            Filter::Or(children) => children.iter().any(|c| c.matches(doc)),
            Filter::Field { path, condition } => condition.matches(lookup(doc, path)),
        }
    }

    /// Every path the filter reads.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_paths(out);
                }
            }
            Filter::Field { path, .. } => out.push(path),
        }
    }

    /// Index predicates implied by the conjunctive part of the filter.
    pub fn pushdown(&self) -> Pushdown {
        let mut pushdown = Pushdown {
            predicates: Vec::new(),
            exact: true,
        };
        self.push(&mut pushdown);
        pushdown
    }

    fn push(&self, out: &mut Pushdown) {
        match self {
            Filter::And(children) => {
                for child in children {
                    child.push(out);
                }
            }
            Filter::Or(_) => out.exact = false,
            Filter::Field { path, condition } => match field_predicate(path, condition) {
                Some((predicate, exact)) => {
                    out.predicates.push(predicate);
                    out.exact &= exact;
                }
                None => out.exact = false,
            },
        }
    }

    /// `_id` equality, if the filter pins the document by key.
    pub fn id_equality(&self) -> Option<DocumentId> {
        match self {
            Filter::And(children) => children.iter().find_map(Filter::id_equality),
            Filter::Field {
                path,
                condition: Condition::Eq(value),
            } if path == ID_FIELD => DocumentId::from_json(value).ok(),
            _ => None,
        }
    }

    /// Top-level equality pairs, used to seed an upserted document.
    pub fn equalities(&self) -> Vec<(&str, &JsonValue)> {
        match self {
            Filter::And(children) => children.iter().flat_map(Filter::equalities).collect(),
            Filter::Field {
                path,
                condition: Condition::Eq(value),
            } => vec![(path.as_str(), value)],
            _ => Vec::new(),
        }
    }
}

fn parse_clause(clause: &Map<String, JsonValue>, limits: &Limits) -> Result<Filter> {
    let mut children = Vec::with_capacity(clause.len());
    for (key, value) in clause {
        match key.as_str() {
            "$and" | "$or" => {
                let branches = parse_branches(key, value, limits)?;
                children.push(if key == "$and" {
                    Filter::And(branches)
                } else {
                    Filter::Or(branches)
                });
            }
            op if op.starts_with('$') => {
                return Err(Error::invalid_filter(format!(
                    "unsupported filter operator '{}'",
                    op
                )))
            }
            path => {
                check_path(path)?;
                for condition in parse_conditions(path, value, limits)? {
                    children.push(Filter::Field {
                        path: path.to_string(),
                        condition,
                    });
                }
            }
        }
    }
    Ok(Filter::And(children))
}

fn parse_branches(op: &str, value: &JsonValue, limits: &Limits) -> Result<Vec<Filter>> {
    let JsonValue::Array(items) = value else {
        return Err(Error::invalid_filter(format!("'{}' requires an array", op)));
    };
    if items.is_empty() {
        return Err(Error::invalid_filter(format!("'{}' requires at least one clause", op)));
    }
    items
        .iter()
        .map(|item| match item {
            JsonValue::Object(clause) => parse_clause(clause, limits),
            other => Err(Error::invalid_filter(format!(
                "'{}' clauses must be objects, got {}",
                op,
                json_type_name(other)
            ))),
        })
        .collect()
}

fn check_path(path: &str) -> Result<()> {
    if path == VECTOR_FIELD || path == LEXICAL_FIELD {
        return Err(Error::invalid_filter(format!(
            "'{}' cannot be filtered on; use it in 'sort'",
            path
        )));
    }
    if path.split('.').any(str::is_empty) {
        return Err(Error::invalid_filter(format!("invalid filter path '{}'", path)));
    }
    Ok(())
}

fn is_operator_object(value: &JsonValue) -> Result<bool> {
    let JsonValue::Object(map) = value else {
        return Ok(false);
    };
    let operators = map.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        return Ok(false);
    }
    if operators != map.len() {
        return Err(Error::invalid_filter(
            "cannot mix operators and field names in one condition",
        ));
    }
    Ok(true)
}

fn parse_conditions(path: &str, value: &JsonValue, limits: &Limits) -> Result<Vec<Condition>> {
    if !is_operator_object(value)? {
        check_id_value(path, value)?;
        return Ok(vec![Condition::Eq(value.clone())]);
    }
    let JsonValue::Object(ops) = value else {
        return Ok(Vec::new());
    };
    ops.iter()
        .map(|(op, operand)| parse_operator(path, op, operand, limits))
        .collect()
}

fn parse_operator(path: &str, op: &str, operand: &JsonValue, limits: &Limits) -> Result<Condition> {
    let number = |operand: &JsonValue| {
        operand.as_f64().ok_or_else(|| {
            Error::invalid_filter(format!("'{}' on '{}' requires a number", op, path))
        })
    };
    let condition = match op {
        "$eq" => Condition::Eq(operand.clone()),
        "$ne" => Condition::Ne(operand.clone()),
        "$in" => Condition::In(value_list(path, op, operand, limits)?),
        "$nin" => Condition::Nin(value_list(path, op, operand, limits)?),
        "$all" => Condition::All(value_list(path, op, operand, limits)?),
        "$gt" => Condition::Cmp(CmpOp::Gt, number(operand)?),
        "$gte" => Condition::Cmp(CmpOp::Gte, number(operand)?),
        "$lt" => Condition::Cmp(CmpOp::Lt, number(operand)?),
        "$lte" => Condition::Cmp(CmpOp::Lte, number(operand)?),
        "$exists" => match operand {
            JsonValue::Bool(b) => Condition::Exists(*b),
            _ => {
                return Err(Error::invalid_filter(format!(
                    "'$exists' on '{}' requires a boolean",
                    path
                )))
            }
        },
        "$size" => match operand.as_u64() {
            Some(n) => Condition::Size(n as usize),
            None => {
                return Err(Error::invalid_filter(format!(
                    "'$size' on '{}' requires a non-negative integer",
                    path
                )))
            }
        },
        other => {
            return Err(Error::invalid_filter(format!(
                "unsupported filter operator '{}'",
                other
            )))
        }
    };
    match &condition {
        Condition::Eq(v) | Condition::Ne(v) => check_id_value(path, v)?,
        Condition::In(vs) | Condition::Nin(vs) => {
            for v in vs {
                check_id_value(path, v)?;
            }
        }
        _ => {}
    }
    Ok(condition)
}

fn value_list(path: &str, op: &str, operand: &JsonValue, limits: &Limits) -> Result<Vec<JsonValue>> {
    let JsonValue::Array(values) = operand else {
        return Err(Error::invalid_filter(format!(
            "'{}' on '{}' requires an array",
            op, path
        )));
    };
    if values.len() > limits.max_in_values {
        return Err(Error::invalid_filter(format!(
            "'{}' on '{}' has {} values, maximum is {}",
            op,
            path,
            values.len(),
            limits.max_in_values
        )));
    }
    Ok(values.clone())
}

fn check_id_value(path: &str, value: &JsonValue) -> Result<()> {
    if path == ID_FIELD {
        DocumentId::from_json(value)
            .map_err(|e| Error::invalid_filter(format!("invalid '_id' in filter: {}", e)))?;
    }
    Ok(())
}

fn field_predicate(path: &str, condition: &Condition) -> Option<(ColumnPredicate, bool)> {
    // Positional paths (`tags.0`) are not shredded.
    if path.split('.').any(|seg| seg.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    match condition {
        Condition::Eq(value) if path == ID_FIELD => {
            let id = DocumentId::from_json(value).ok()?;
            Some((ColumnPredicate::KeyEq(id.storage_key().to_string()), true))
        }
        Condition::In(values) if path == ID_FIELD => {
            let keys = values
                .iter()
                .map(|v| DocumentId::from_json(v).ok().map(|id| id.storage_key().to_string()))
                .collect::<Option<Vec<_>>>()?;
            Some((ColumnPredicate::KeyIn(keys), true))
        }
        Condition::Eq(value) => equality_predicate(path, value),
        Condition::In(values) => {
            let mut alternatives = Vec::new();
            let mut exact = true;
            for value in values {
                let (predicate, e) = equality_predicate(path, value)?;
                exact &= e;
                match predicate {
                    ColumnPredicate::AnyOf(inner) => alternatives.extend(inner),
                    other => alternatives.push(other),
                }
            }
            Some((ColumnPredicate::AnyOf(alternatives), exact))
        }
        Condition::Cmp(op, value) => Some((
            ColumnPredicate::NumberCmp {
                path: path.to_string(),
                op: *op,
                value: *value,
            },
            true,
        )),
        Condition::Exists(true) => Some((ColumnPredicate::Exists(path.to_string()), true)),
        // Only the first value is pushed; evaluation checks the rest.
        Condition::All(values) => {
            let first = values.first().and_then(|v| array_entry(path, v))?;
            Some((ColumnPredicate::ArrayContains(first), values.len() == 1))
        }
        _ => None,
    }
}

fn equality_predicate(path: &str, value: &JsonValue) -> Option<(ColumnPredicate, bool)> {
    let scalar = match value {
        JsonValue::String(s) => ColumnPredicate::TextEq {
            path: path.to_string(),
            value: s.clone(),
        },
        JsonValue::Number(n) => ColumnPredicate::NumberEq {
            path: path.to_string(),
            value: n.as_f64()?,
        },
        JsonValue::Bool(b) => ColumnPredicate::BoolEq {
            path: path.to_string(),
            value: *b,
        },
        JsonValue::Null => ColumnPredicate::IsNull(path.to_string()),
        // Arrays and objects compare whole values; the store only knows the path exists.
        JsonValue::Array(_) | JsonValue::Object(_) => {
            return Some((ColumnPredicate::Exists(path.to_string()), false))
        }
    };
    let element = ColumnPredicate::ArrayContains(array_entry(path, value)?);
    Some((ColumnPredicate::AnyOf(vec![scalar, element]), true))
}

/// Resolve a dotted path; numeric segments index into arrays.
pub fn lookup<'a>(doc: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(doc, |current, segment| match current {
        JsonValue::Object(fields) => fields.get(segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// JSON equality where numbers compare by value (`1 == 1.0`).
pub fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| json_eq(l, r))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map_or(false, |other| json_eq(v, other)))
        }
        _ => a == b,
    }
}

fn eq_matches(field: Option<&JsonValue>, value: &JsonValue) -> bool {
    match field {
        None => false,
        Some(JsonValue::Array(items)) if !value.is_array() => {
            items.iter().any(|item| json_eq(item, value))
        }
        Some(field) => json_eq(field, value),
    }
}

impl Condition {
    fn matches(&self, field: Option<&JsonValue>) -> bool {
        match self {
            Condition::Eq(value) => eq_matches(field, value),
            Condition::Ne(value) => !eq_matches(field, value),
            Condition::In(values) => values.iter().any(|v| eq_matches(field, v)),
            Condition::Nin(values) => !values.iter().any(|v| eq_matches(field, v)),
            Condition::Cmp(op, value) => match field {
                Some(JsonValue::Number(n)) => n.as_f64().map_or(false, |n| op.eval(n, *value)),
                _ => false,
            },
            Condition::Exists(expected) => field.is_some() == *expected,
            Condition::All(values) => match field {
                Some(JsonValue::Array(items)) => values
                    .iter()
                    .all(|v| items.iter().any(|item| json_eq(item, v))),
                _ => false,
            },
            Condition::Size(n) => matches!(field, Some(JsonValue::Array(items)) if items.len() == *n),
        }
    }
}
