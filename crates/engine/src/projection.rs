//! Result projections
//!
//! A projection either includes or excludes paths; the two cannot be mixed,
//! except for `_id` which may be switched either way. `$vector` and
//! `$lexical` are left out of results unless named explicitly or the
//! projection is `{"*": 1}`.

use serde_json::{Map, Value as JsonValue};

use tessera_core::{json_type_name, ID_FIELD, LEXICAL_FIELD, VECTOR_FIELD};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    All,
    Include,
    Exclude,
}

/// Parsed projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    mode: Mode,
    paths: Vec<String>,
    include_id: bool,
    include_vector: bool,
    include_lexical: bool,
}

impl Default for Projection {
    fn default() -> Self {
        Projection {
            mode: Mode::All,
            paths: Vec::new(),
            include_id: true,
            include_vector: false,
            include_lexical: false,
        }
    }
}

fn flag(path: &str, value: &JsonValue) -> Result<bool> {
    match value {
        JsonValue::Bool(b) => Ok(*b),
        JsonValue::Number(n) if n.as_f64() == Some(0.0) => Ok(false),
        JsonValue::Number(n) if n.as_f64() == Some(1.0) => Ok(true),
        other => Err(Error::invalid_request(format!(
            "projection for '{}' must be 0, 1 or a boolean, got {}",
            path,
            json_type_name(other)
        ))),
    }
}

impl Projection {
    /// Parse a projection clause; `None` is the default projection.
    pub fn parse(raw: Option<&JsonValue>) -> Result<Projection> {
        let clause = match raw {
            None | Some(JsonValue::Null) => return Ok(Projection::default()),
            Some(JsonValue::Object(clause)) => clause,
            Some(other) => {
                return Err(Error::invalid_request(format!(
                    "projection must be an object, got {}",
                    json_type_name(other)
                )))
            }
        };

        if let Some(star) = clause.get("*") {
            if clause.len() != 1 {
                return Err(Error::invalid_request(
                    "wildcard projection cannot be combined with paths",
                ));
            }
            let all = flag("*", star)?;
            return Ok(Projection {
                mode: if all { Mode::All } else { Mode::Include },
                paths: Vec::new(),
                include_id: all,
                include_vector: all,
                include_lexical: all,
            });
        }

        let mut projection = Projection::default();
        let mut id = None;
        for (path, value) in clause {
            let include = flag(path, value)?;
            match path.as_str() {
                ID_FIELD => id = Some(include),
                VECTOR_FIELD => projection.include_vector = include,
                LEXICAL_FIELD => projection.include_lexical = include,
                _ => {
                    if path.split('.').any(|seg| seg.is_empty() || seg.starts_with('$')) {
                        return Err(Error::invalid_request(format!(
                            "invalid projection path '{}'",
                            path
                        )));
                    }
                    let mode = if include { Mode::Include } else { Mode::Exclude };
                    if projection.mode != Mode::All && projection.mode != mode {
                        return Err(Error::invalid_request(
                            "projection cannot mix inclusions and exclusions",
                        ));
                    }
                    projection.mode = mode;
                    projection.paths.push(path.clone());
                }
            }
        }
        check_overlap(&projection.paths)?;
        projection.include_id = id.unwrap_or(true);
        Ok(projection)
    }

    /// Whether `$vector` survives the projection.
    pub fn includes_vector(&self) -> bool {
        self.include_vector
    }

    /// Project a full document.
    pub fn apply(&self, doc: Map<String, JsonValue>) -> Map<String, JsonValue> {
        let mut out = match self.mode {
            Mode::All => doc,
            Mode::Exclude => {
                let mut out = doc;
                for path in &self.paths {
                    remove_path(&mut out, path);
                }
                out
            }
            Mode::Include => {
                let mut out = Map::new();
                for path in &self.paths {
                    if let Some(value) = get_path(&doc, path) {
                        insert_path(&mut out, path, value.clone());
                    }
                }
                for reserved in [ID_FIELD, VECTOR_FIELD, LEXICAL_FIELD] {
                    if let Some(value) = doc.get(reserved) {
                        out.insert(reserved.to_string(), value.clone());
                    }
                }
                out
            }
        };
        if !self.include_id {
            out.remove(ID_FIELD);
        }
        if !self.include_vector {
            out.remove(VECTOR_FIELD);
        }
        if !self.include_lexical {
            out.remove(LEXICAL_FIELD);
        }
        out
    }
}

fn check_overlap(paths: &[String]) -> Result<()> {
    let mut sorted: Vec<&str> = paths.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b.starts_with(a) && b.as_bytes().get(a.len()) == Some(&b'.') {
            return Err(Error::invalid_request(format!(
                "projection paths '{}' and '{}' overlap",
                a, b
            )));
        }
    }
    Ok(())
}

fn get_path<'a>(doc: &'a Map<String, JsonValue>, path: &str) -> Option<&'a JsonValue> {
    let mut segments = path.split('.');
    let first = doc.get(segments.next()?)?;
    segments.try_fold(first, |current, segment| match current {
        JsonValue::Object(fields) => fields.get(segment),
        _ => None,
    })
}

/// Set a dotted path, creating intermediate objects.
pub(crate) fn insert_path(doc: &mut Map<String, JsonValue>, path: &str, value: JsonValue) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if let JsonValue::Object(child) = child {
                insert_path(child, rest, value);
            }
        }
    }
}

fn remove_path(doc: &mut Map<String, JsonValue>, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(JsonValue::Object(child)) = doc.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}
