//! Collection options
//!
//! Options are fixed when a collection is created. Two option sets are
//! compared after [`CollectionOptions::normalized`], so a disabled lexical
//! block is the same as no lexical block at all.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::limits::Limits;

/// Analyzer used when `lexical.analyzer` is omitted.
pub const DEFAULT_ANALYZER: &str = "standard";

/// Invalid `createCollection` options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid collection options: {0}")]
pub struct OptionsError(pub String);

/// Similarity function used by the vector index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Cosine similarity
    #[default]
    Cosine,
    /// Inverse euclidean distance
    Euclidean,
    /// Dot product
    DotProduct,
}

impl SimilarityMetric {
    /// Name as it appears in collection options
    pub fn name(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::Euclidean => "euclidean",
            SimilarityMetric::DotProduct => "dot_product",
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vector search configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorOptions {
    /// Embedding dimension
    pub dimension: usize,
    /// Similarity metric
    #[serde(default)]
    pub metric: SimilarityMetric,
}

/// Lexical (BM25) search configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LexicalOptions {
    /// Whether the lexical index is created
    pub enabled: bool,
    /// Analyzer name handed to the store's text index
    #[serde(default = "default_analyzer")]
    pub analyzer: String,
}

fn default_analyzer() -> String {
    DEFAULT_ANALYZER.to_string()
}

/// Which document paths get indexed. At most one of `allow`/`deny` is set.
///
/// `"*"` matches every path. An entry also covers everything nested under it,
/// so denying `address` denies `address.city`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexingOptions {
    /// Only these paths are indexed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<String>>,
    /// Every path except these is indexed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<Vec<String>>,
}

impl IndexingOptions {
    /// Whether filters and sorts may use `path`.
    pub fn is_indexed(&self, path: &str) -> bool {
        if path == crate::types::ID_FIELD {
            return true;
        }
        if let Some(allow) = &self.allow {
            return allow.iter().any(|p| covers(p, path));
        }
        if let Some(deny) = &self.deny {
            return !deny.iter().any(|p| covers(p, path));
        }
        true
    }

    fn is_empty(&self) -> bool {
        self.allow.is_none() && self.deny.is_none()
    }
}

fn covers(rule: &str, path: &str) -> bool {
    rule == "*"
        || rule == path
        || (path.len() > rule.len() && path.starts_with(rule) && path.as_bytes()[rule.len()] == b'.')
}

/// Options supplied to `createCollection`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionOptions {
    /// Vector search configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<VectorOptions>,
    /// Lexical search configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical: Option<LexicalOptions>,
    /// Path indexing rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexing: Option<IndexingOptions>,
}

impl CollectionOptions {
    /// Options with vector search enabled.
    pub fn with_vector(mut self, dimension: usize, metric: SimilarityMetric) -> Self {
        self.vector = Some(VectorOptions { dimension, metric });
        self
    }

    /// Options with lexical search enabled.
    pub fn with_lexical(mut self, analyzer: impl Into<String>) -> Self {
        self.lexical = Some(LexicalOptions {
            enabled: true,
            analyzer: analyzer.into(),
        });
        self
    }

    /// Options with an indexing rule set.
    pub fn with_indexing(mut self, indexing: IndexingOptions) -> Self {
        self.indexing = Some(indexing);
        self
    }

    /// Check the options against the configured limits.
    pub fn validate(&self, limits: &Limits) -> Result<(), OptionsError> {
        if let Some(vector) = &self.vector {
            if vector.dimension == 0 {
                return Err(OptionsError("'vector.dimension' must be positive".into()));
            }
            if vector.dimension > limits.max_vector_dimension {
                return Err(OptionsError(format!(
                    "'vector.dimension' {} exceeds maximum {}",
                    vector.dimension, limits.max_vector_dimension
                )));
            }
        }
        if let Some(lexical) = &self.lexical {
            if lexical.enabled && lexical.analyzer.trim().is_empty() {
                return Err(OptionsError("'lexical.analyzer' must not be empty".into()));
            }
        }
        if let Some(indexing) = &self.indexing {
            if indexing.allow.is_some() && indexing.deny.is_some() {
                return Err(OptionsError(
                    "'indexing' may contain 'allow' or 'deny', not both".into(),
                ));
            }
            let paths = indexing.allow.iter().chain(indexing.deny.iter()).flatten();
            for path in paths {
                if path.is_empty() || path.starts_with('$') || path.split('.').any(str::is_empty) {
                    return Err(OptionsError(format!("invalid indexing path '{}'", path)));
                }
            }
        }
        Ok(())
    }

    /// Canonical form used for identity comparison and persistence.
    pub fn normalized(&self) -> Self {
        let lexical = self.lexical.clone().filter(|l| l.enabled);
        let indexing = self.indexing.clone().filter(|i| !i.is_empty()).map(|mut i| {
            if let Some(allow) = i.allow.as_mut() {
                allow.sort();
                allow.dedup();
            }
            if let Some(deny) = i.deny.as_mut() {
                deny.sort();
                deny.dedup();
            }
            i
        });
        CollectionOptions {
            vector: self.vector.clone(),
            lexical,
            indexing,
        }
    }

    /// Whether two option sets describe the same collection.
    pub fn is_equivalent(&self, other: &CollectionOptions) -> bool {
        self.normalized() == other.normalized()
    }

    /// Vector configuration, if any.
    pub fn vector(&self) -> Option<&VectorOptions> {
        self.vector.as_ref()
    }

    /// Lexical configuration, if enabled.
    pub fn lexical(&self) -> Option<&LexicalOptions> {
        self.lexical.as_ref().filter(|l| l.enabled)
    }

    /// Whether `path` is indexed under these options.
    pub fn is_indexed(&self, path: &str) -> bool {
        self.indexing.as_ref().map_or(true, |i| i.is_indexed(path))
    }
}
