//! Document shredding
//!
//! A document is stored as one row: the JSON body plus typed projections of
//! every indexed leaf, so filters can be answered by secondary indexes.
//!
//! Paths are dotted (`address.city`). Array elements do not get their own
//! paths; instead each scalar element is recorded in `array_contains` as an
//! encoded `path` + value entry.

use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use tessera_core::{json_type_name, DocumentId, Limits, ID_FIELD, LEXICAL_FIELD, VECTOR_FIELD};
use tessera_storage::Row;

use crate::catalog::CollectionSchema;
use crate::error::{Error, Result};

/// A parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Identifier
    pub id: DocumentId,
    /// Body without `_id`, `$vector` and `$lexical`
    pub body: Map<String, JsonValue>,
    /// Embedding
    pub vector: Option<Vec<f32>>,
    /// Text for lexical search
    pub lexical: Option<String>,
}

impl Document {
    /// Parse a client document. Assigns a UUID `_id` when absent.
    pub fn from_json(value: JsonValue, limits: &Limits) -> Result<Self> {
        let size = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
        limits.check_document_size(size)?;

        let mut body = match value {
            JsonValue::Object(body) => body,
            other => {
                return Err(Error::invalid_request(format!(
                    "document must be an object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let id = match body.remove(ID_FIELD) {
            Some(raw) => DocumentId::from_json(&raw)?,
            None => DocumentId::generate(),
        };
        let vector = match body.remove(VECTOR_FIELD) {
            None | Some(JsonValue::Null) => None,
            Some(raw) => Some(parse_vector(&raw)?),
        };
        let lexical = match body.remove(LEXICAL_FIELD) {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(text)) => Some(text),
            Some(other) => {
                return Err(Error::invalid_request(format!(
                    "'{}' must be a string, got {}",
                    LEXICAL_FIELD,
                    json_type_name(&other)
                )))
            }
        };
        check_field_names(&body)?;

        Ok(Document {
            id,
            body,
            vector,
            lexical,
        })
    }

    /// Rebuild a document from its stored row.
    pub fn from_row(row: &Row) -> Result<Self> {
        let body: Map<String, JsonValue> = serde_json::from_str(&row.doc_json).map_err(|e| {
            Error::StoreQuery {
                message: format!("corrupt document body for key '{}': {}", row.key, e),
            }
        })?;
        Ok(Document {
            id: DocumentId::from_storage_key(&row.key)?,
            body,
            vector: row.vector.clone(),
            lexical: row.lexical.clone(),
        })
    }

    /// Full document as clients see it.
    pub fn to_json(&self) -> JsonValue {
        let mut out = Map::with_capacity(self.body.len() + 3);
        out.insert(ID_FIELD.to_string(), self.id.to_json());
        for (k, v) in &self.body {
            out.insert(k.clone(), v.clone());
        }
        if let Some(vector) = &self.vector {
            out.insert(
                VECTOR_FIELD.to_string(),
                JsonValue::Array(vector.iter().map(|f| JsonValue::from(*f as f64)).collect()),
            );
        }
        if let Some(text) = &self.lexical {
            out.insert(LEXICAL_FIELD.to_string(), JsonValue::String(text.clone()));
        }
        JsonValue::Object(out)
    }

    /// Shred into a row for `schema` with a fresh version marker.
    pub fn shred(&self, schema: &CollectionSchema) -> Result<Row> {
        if let Some(vector) = &self.vector {
            match schema.vector_dimension() {
                None => {
                    return Err(Error::VectorNotEnabled {
                        collection: schema.name.to_string(),
                    })
                }
                Some(expected) if expected != vector.len() => {
                    return Err(Error::VectorDimensionMismatch {
                        expected,
                        actual: vector.len(),
                    })
                }
                _ => {}
            }
        }
        if self.lexical.is_some() && schema.options.lexical().is_none() {
            return Err(Error::LexicalNotEnabled {
                collection: schema.name.to_string(),
            });
        }

        let mut row = Row {
            key: self.id.storage_key().to_string(),
            tx_id: Uuid::new_v4(),
            doc_json: serde_json::to_string(&self.body)
                .map_err(|e| Error::invalid_request(e.to_string()))?,
            vector: self.vector.clone(),
            lexical: self.lexical.clone(),
            ..Default::default()
        };
        let mut shredder = Shredder {
            schema,
            row: &mut row,
        };
        shredder.leaf(ID_FIELD, &self.id.to_json());
        for (key, value) in &self.body {
            shredder.walk(key, value);
        }
        Ok(row)
    }
}

/// Parse a `$vector` value: a non-empty array of numbers.
pub(crate) fn parse_vector(raw: &JsonValue) -> Result<Vec<f32>> {
    let JsonValue::Array(items) = raw else {
        return Err(Error::invalid_request(format!(
            "'{}' must be an array of numbers",
            VECTOR_FIELD
        )));
    };
    if items.is_empty() {
        return Err(Error::invalid_request(format!("'{}' must not be empty", VECTOR_FIELD)));
    }
    items
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                Error::invalid_request(format!(
                    "'{}' must contain only numbers, found {}",
                    VECTOR_FIELD,
                    json_type_name(v)
                ))
            })
        })
        .collect()
}

fn check_field_names(body: &Map<String, JsonValue>) -> Result<()> {
    for (key, value) in body {
        if key.is_empty() || key.starts_with('$') || key.contains('.') {
            return Err(Error::invalid_request(format!(
                "invalid field name '{}': must be non-empty, not start with '$' and not contain '.'",
                key
            )));
        }
        match value {
            JsonValue::Object(inner) => check_field_names(inner)?,
            JsonValue::Array(items) => {
                for item in items {
                    if let JsonValue::Object(inner) = item {
                        check_field_names(inner)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Encoded `array_contains` entry for one scalar element at `path`.
///
/// The value is type-tagged so `"1"` and `1` stay distinct.
pub fn array_entry(path: &str, value: &JsonValue) -> Option<String> {
    let encoded = match value {
        JsonValue::String(s) => format!("S{}", s),
        JsonValue::Number(n) => format!("N{}", n.as_f64()?),
        JsonValue::Bool(b) => format!("B{}", b),
        JsonValue::Null => "Z".to_string(),
        JsonValue::Array(_) | JsonValue::Object(_) => return None,
    };
    Some(format!("{} {}", path, encoded))
}

struct Shredder<'a> {
    schema: &'a CollectionSchema,
    row: &'a mut Row,
}

impl Shredder<'_> {
    fn walk(&mut self, path: &str, value: &JsonValue) {
        if !self.schema.options.is_indexed(path) {
            return;
        }
        match value {
            JsonValue::Object(fields) => {
                self.row.exist_keys.insert(path.to_string());
                for (key, inner) in fields {
                    self.walk(&format!("{}.{}", path, key), inner);
                }
            }
            JsonValue::Array(items) => {
                self.row.exist_keys.insert(path.to_string());
                for item in items {
                    if let Some(entry) = array_entry(path, item) {
                        self.row.array_contains.insert(entry);
                    }
                }
            }
            scalar => self.leaf(path, scalar),
        }
    }

    fn leaf(&mut self, path: &str, value: &JsonValue) {
        self.row.exist_keys.insert(path.to_string());
        match value {
            JsonValue::String(s) => {
                self.row.text_values.insert(path.to_string(), s.clone());
            }
            JsonValue::Number(n) => {
                if let Some(f) = n.as_f64() {
                    self.row.number_values.insert(path.to_string(), f);
                }
            }
            JsonValue::Bool(b) => {
                self.row.bool_values.insert(path.to_string(), *b);
            }
            JsonValue::Null => {
                self.row.null_values.insert(path.to_string());
            }
            JsonValue::Array(_) | JsonValue::Object(_) => {}
        }
    }
}
