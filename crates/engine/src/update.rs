//! Update operators
//!
//! An update clause maps operators to `{path: argument}` objects. It is
//! applied to the full client-visible document (including `$vector` and
//! `$lexical`), after which the document is re-parsed and re-shredded.

use serde_json::{Map, Number, Value as JsonValue};
use std::cmp::Ordering;

use tessera_core::{json_type_name, ID_FIELD, LEXICAL_FIELD, VECTOR_FIELD};

use crate::error::{Error, Result};
use crate::filter::json_eq;

/// A single update operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// `$set`
    Set,
    /// `$setOnInsert`: applied only when an upsert inserts
    SetOnInsert,
    /// `$unset`
    Unset,
    /// `$inc`
    Inc,
    /// `$mul`
    Mul,
    /// `$min`
    Min,
    /// `$max`
    Max,
    /// `$push` (with optional `$each`)
    Push,
    /// `$addToSet` (with optional `$each`)
    AddToSet,
    /// `$pop`: 1 removes the last element, -1 the first
    Pop,
    /// `$rename`
    Rename,
}

impl UpdateOperator {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "$set" => UpdateOperator::Set,
            "$setOnInsert" => UpdateOperator::SetOnInsert,
            "$unset" => UpdateOperator::Unset,
            "$inc" => UpdateOperator::Inc,
            "$mul" => UpdateOperator::Mul,
            "$min" => UpdateOperator::Min,
            "$max" => UpdateOperator::Max,
            "$push" => UpdateOperator::Push,
            "$addToSet" => UpdateOperator::AddToSet,
            "$pop" => UpdateOperator::Pop,
            "$rename" => UpdateOperator::Rename,
            _ => return None,
        })
    }

    /// Operator name as written by clients.
    pub fn name(&self) -> &'static str {
        match self {
            UpdateOperator::Set => "$set",
            UpdateOperator::SetOnInsert => "$setOnInsert",
            UpdateOperator::Unset => "$unset",
            UpdateOperator::Inc => "$inc",
            UpdateOperator::Mul => "$mul",
            UpdateOperator::Min => "$min",
            UpdateOperator::Max => "$max",
            UpdateOperator::Push => "$push",
            UpdateOperator::AddToSet => "$addToSet",
            UpdateOperator::Pop => "$pop",
            UpdateOperator::Rename => "$rename",
        }
    }

    fn allows_reserved(&self) -> bool {
        matches!(
            self,
            UpdateOperator::Set | UpdateOperator::SetOnInsert | UpdateOperator::Unset
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Operation {
    op: UpdateOperator,
    path: String,
    arg: JsonValue,
}

/// Parsed update clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    operations: Vec<Operation>,
}

impl Update {
    /// Parse and validate an update clause.
    pub fn parse(raw: &JsonValue) -> Result<Update> {
        let JsonValue::Object(clause) = raw else {
            return Err(Error::unsupported_update(format!(
                "update must be an object, got {}",
                json_type_name(raw)
            )));
        };
        if clause.is_empty() {
            return Err(Error::unsupported_update("update clause is empty"));
        }

        let mut operations = Vec::new();
        for (name, fields) in clause {
            let op = UpdateOperator::parse(name).ok_or_else(|| {
                if name.starts_with('$') {
                    Error::unsupported_update(format!("unsupported update operator '{}'", name))
                } else {
                    Error::unsupported_update(format!(
                        "replacement documents are not supported; found field '{}'",
                        name
                    ))
                }
            })?;
            let JsonValue::Object(fields) = fields else {
                return Err(Error::unsupported_update(format!(
                    "'{}' requires an object argument",
                    name
                )));
            };
            for (path, arg) in fields {
                check_path(op, path)?;
                check_argument(op, path, arg)?;
                operations.push(Operation {
                    op,
                    path: path.clone(),
                    arg: arg.clone(),
                });
            }
        }
        check_conflicts(&operations)?;
        Ok(Update { operations })
    }

    /// Operators present in this clause.
    pub fn operators(&self) -> Vec<UpdateOperator> {
        let mut out: Vec<UpdateOperator> = Vec::new();
        for operation in &self.operations {
            if !out.contains(&operation.op) {
                out.push(operation.op);
            }
        }
        out
    }

    /// Apply to `doc`; returns whether anything changed.
    ///
    /// `inserting` enables `$setOnInsert`.
    pub fn apply(&self, doc: &mut Map<String, JsonValue>, inserting: bool) -> Result<bool> {
        let mut changed = false;
        for operation in &self.operations {
            changed |= operation.apply(doc, inserting)?;
        }
        Ok(changed)
    }
}

fn check_path(op: UpdateOperator, path: &str) -> Result<()> {
    if path == ID_FIELD || path.starts_with("_id.") {
        return Err(Error::unsupported_update(format!(
            "'{}' cannot modify '_id'",
            op.name()
        )));
    }
    if path == VECTOR_FIELD || path == LEXICAL_FIELD {
        if op.allows_reserved() {
            return Ok(());
        }
        return Err(Error::unsupported_update(format!(
            "'{}' cannot be used on '{}'",
            op.name(),
            path
        )));
    }
    if path.split('.').any(|seg| seg.is_empty() || seg.starts_with('$')) {
        return Err(Error::unsupported_update(format!(
            "invalid update path '{}'",
            path
        )));
    }
    Ok(())
}

fn check_argument(op: UpdateOperator, path: &str, arg: &JsonValue) -> Result<()> {
    let ok = match op {
        UpdateOperator::Inc | UpdateOperator::Mul | UpdateOperator::Min | UpdateOperator::Max => {
            arg.is_number()
        }
        UpdateOperator::Pop => matches!(arg.as_i64(), Some(1) | Some(-1)),
        UpdateOperator::Rename => match arg.as_str() {
            Some(target) => {
                check_path(op, target)?;
                target != path
            }
            None => false,
        },
        UpdateOperator::Push | UpdateOperator::AddToSet => match arg {
            JsonValue::Object(m) if m.keys().any(|k| k.starts_with('$')) => {
                m.len() == 1 && matches!(m.get("$each"), Some(JsonValue::Array(_)))
            }
            _ => true,
        },
        UpdateOperator::Set | UpdateOperator::SetOnInsert | UpdateOperator::Unset => true,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::unsupported_update(format!(
            "invalid argument for '{}' on '{}'",
            op.name(),
            path
        )))
    }
}

fn check_conflicts(operations: &[Operation]) -> Result<()> {
    let mut paths: Vec<&str> = Vec::new();
    for operation in operations {
        paths.push(&operation.path);
        if let (UpdateOperator::Rename, Some(target)) = (operation.op, operation.arg.as_str()) {
            paths.push(target);
        }
    }
    paths.sort_unstable();
    for pair in paths.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a == b || (b.starts_with(a) && b.as_bytes().get(a.len()) == Some(&b'.')) {
            return Err(Error::unsupported_update(format!(
                "update paths '{}' and '{}' conflict",
                a, b
            )));
        }
    }
    Ok(())
}

/// Container holding the last path segment. With `create`, missing
/// intermediate objects are added; without it, a missing parent is `None`.
fn parent_mut<'a, 'p>(
    root: &'a mut Map<String, JsonValue>,
    path: &'p str,
    create: bool,
) -> Result<Option<(&'a mut Map<String, JsonValue>, &'p str)>> {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) if path != VECTOR_FIELD && path != LEXICAL_FIELD => {
            (Some(parents), leaf)
        }
        _ => (None, path),
    };
    let mut current = root;
    for segment in parents.into_iter().flat_map(|p| p.split('.')) {
        if !current.contains_key(segment) {
            if !create {
                return Ok(None);
            }
            current.insert(segment.to_string(), JsonValue::Object(Map::new()));
        }
        current = match current.get_mut(segment) {
            Some(JsonValue::Object(inner)) => inner,
            Some(_) if !create => return Ok(None),
            Some(other) => {
                return Err(Error::unsupported_update(format!(
                    "cannot create '{}': '{}' is {}",
                    path,
                    segment,
                    json_type_name(other)
                )))
            }
            None => return Ok(None),
        };
    }
    Ok(Some((current, leaf)))
}

fn replace(container: &mut Map<String, JsonValue>, leaf: &str, value: JsonValue) -> bool {
    match container.get(leaf) {
        Some(old) if json_eq(old, &value) => false,
        _ => {
            container.insert(leaf.to_string(), value);
            true
        }
    }
}

fn each(arg: &JsonValue) -> Vec<JsonValue> {
    match arg {
        JsonValue::Object(m) if m.contains_key("$each") => match m.get("$each") {
            Some(JsonValue::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        other => vec![other.clone()],
    }
}

fn arithmetic(lhs: &Number, rhs: &Number, op: UpdateOperator) -> Option<Number> {
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        let exact = match op {
            UpdateOperator::Inc => a.checked_add(b),
            _ => a.checked_mul(b),
        };
        if let Some(n) = exact {
            return Some(Number::from(n));
        }
    }
    let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
    let result = match op {
        UpdateOperator::Inc => a + b,
        _ => a * b,
    };
    Number::from_f64(result)
}

impl Operation {
    fn type_error(&self, found: &JsonValue) -> Error {
        Error::unsupported_update(format!(
            "'{}' cannot be applied to '{}' holding {}",
            self.op.name(),
            self.path,
            json_type_name(found)
        ))
    }

    fn apply(&self, doc: &mut Map<String, JsonValue>, inserting: bool) -> Result<bool> {
        match self.op {
            UpdateOperator::SetOnInsert if !inserting => Ok(false),
            UpdateOperator::Set | UpdateOperator::SetOnInsert => {
                let Some((container, leaf)) = parent_mut(doc, &self.path, true)? else {
                    return Ok(false);
                };
                Ok(replace(container, leaf, self.arg.clone()))
            }
            UpdateOperator::Unset => match parent_mut(doc, &self.path, false)? {
                Some((container, leaf)) => Ok(container.remove(leaf).is_some()),
                None => Ok(false),
            },
            UpdateOperator::Rename => {
                let target = self.arg.as_str().unwrap_or_default();
                let moved = match parent_mut(doc, &self.path, false)? {
                    Some((container, leaf)) => container.remove(leaf),
                    None => None,
                };
                let Some(value) = moved else {
                    return Ok(false);
                };
                if let Some((container, leaf)) = parent_mut(doc, target, true)? {
                    container.insert(leaf.to_string(), value);
                }
                Ok(true)
            }
            UpdateOperator::Inc | UpdateOperator::Mul => {
                let Some((container, leaf)) = parent_mut(doc, &self.path, true)? else {
                    return Ok(false);
                };
                let JsonValue::Number(arg) = &self.arg else {
                    return Err(self.type_error(&self.arg));
                };
                let next = match container.get(leaf) {
                    None if self.op == UpdateOperator::Inc => arg.clone(),
                    None => Number::from(0),
                    Some(JsonValue::Number(current)) => arithmetic(current, arg, self.op)
                        .ok_or_else(|| {
                            Error::unsupported_update(format!(
                                "'{}' on '{}' overflows",
                                self.op.name(),
                                self.path
                            ))
                        })?,
                    Some(other) => return Err(self.type_error(other)),
                };
                Ok(replace(container, leaf, JsonValue::Number(next)))
            }
            UpdateOperator::Min | UpdateOperator::Max => {
                let Some((container, leaf)) = parent_mut(doc, &self.path, true)? else {
                    return Ok(false);
                };
                let wanted = if self.op == UpdateOperator::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let take = match container.get(leaf) {
                    None => true,
                    Some(JsonValue::Number(current)) => {
                        let (a, b) = (self.arg.as_f64(), current.as_f64());
                        a.partial_cmp(&b) == Some(wanted)
                    }
                    Some(other) => return Err(self.type_error(other)),
                };
                if take {
                    container.insert(leaf.to_string(), self.arg.clone());
                }
                Ok(take)
            }
            UpdateOperator::Push | UpdateOperator::AddToSet => {
                let Some((container, leaf)) = parent_mut(doc, &self.path, true)? else {
                    return Ok(false);
                };
                let items = each(&self.arg);
                let created = !container.contains_key(leaf);
                let slot = container
                    .entry(leaf.to_string())
                    .or_insert_with(|| JsonValue::Array(Vec::new()));
                let array = match slot {
                    JsonValue::Array(array) => array,
                    other => return Err(self.type_error(other)),
                };
                let before = array.len();
                for item in items {
                    if self.op == UpdateOperator::AddToSet
                        && array.iter().any(|existing| json_eq(existing, &item))
                    {
                        continue;
                    }
                    array.push(item);
                }
                Ok(created || array.len() != before)
            }
            UpdateOperator::Pop => {
                let Some((container, leaf)) = parent_mut(doc, &self.path, false)? else {
                    return Ok(false);
                };
                match container.get_mut(leaf) {
                    None => Ok(false),
                    Some(JsonValue::Array(array)) if array.is_empty() => Ok(false),
                    Some(JsonValue::Array(array)) => {
                        if self.arg.as_i64() == Some(-1) {
                            array.remove(0);
                        } else {
                            array.pop();
                        }
                        Ok(true)
                    }
                    Some(other) => Err(self.type_error(other)),
                }
            }
        }
    }
}
