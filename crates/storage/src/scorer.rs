//! Scoring for ordered selects
//!
//! - [`similarity`]: vector similarity, normalized to "higher = more similar"
//! - [`Bm25Scorer`]: lexical relevance over a table's lexical column
//!
//! # BM25 Formula
//!
//! For each query term t:
//! score += IDF(t) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * dl/avgdl))

use std::collections::HashMap;

use tessera_core::SimilarityMetric;

use crate::tokenizer::Analyzer;

/// Similarity between two vectors as the store reports it.
///
/// - cosine: `(1 + cos) / 2`, range [0, 1]
/// - dot product: `(1 + dot) / 2`, meaningful for unit vectors
/// - euclidean: `1 / (1 + d²)`, range (0, 1]
///
/// Vectors are used as-is; no implicit normalization.
pub fn similarity(a: &[f32], b: &[f32], metric: SimilarityMetric) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Dimension mismatch in similarity computation");

    match metric {
        SimilarityMetric::Cosine => (1.0 + cosine(a, b)) / 2.0,
        SimilarityMetric::DotProduct => (1.0 + dot_product(a, b)) / 2.0,
        SimilarityMetric::Euclidean => 1.0 / (1.0 + squared_distance(a, b)),
    }
}

/// Returns 0.0 if either vector has zero norm.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product(a, b) / (norm_a * norm_b)
    }
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Relevance of one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relevance {
    /// BM25 score
    pub score: f32,
    /// Distinct query terms present in the document
    pub overlap: usize,
}

/// BM25 scorer bound to a corpus.
///
/// Built once per select from every lexical value in the table, so
/// document frequencies reflect the current contents.
#[derive(Debug, Clone)]
pub struct Bm25Scorer {
    analyzer: Analyzer,
    k1: f32,
    b: f32,
    total_docs: usize,
    avg_doc_len: f32,
    doc_freqs: HashMap<String, usize>,
}

impl Bm25Scorer {
    /// Build corpus statistics from the lexical values of a table.
    pub fn build<'a>(analyzer: Analyzer, corpus: impl Iterator<Item = &'a str>) -> Self {
        let mut total_docs = 0usize;
        let mut total_len = 0usize;
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();
        for text in corpus {
            let terms = analyzer.tokenize(text);
            total_docs += 1;
            total_len += terms.len();
            let mut seen = std::collections::HashSet::new();
            for term in terms {
                if seen.insert(term.clone()) {
                    *doc_freqs.entry(term).or_insert(0) += 1;
                }
            }
        }
        let avg_doc_len = if total_docs == 0 {
            0.0
        } else {
            total_len as f32 / total_docs as f32
        };
        Bm25Scorer {
            analyzer,
            k1: 1.2,
            b: 0.75,
            total_docs,
            avg_doc_len,
            doc_freqs,
        }
    }

    /// IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1)
    fn idf(&self, term: &str) -> f32 {
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        let n = self.total_docs as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Score a document against a query. `None` when no query term occurs.
    pub fn score(&self, text: &str, query: &str) -> Option<Relevance> {
        let query_terms = self.analyzer.tokenize_unique(query);
        let doc_terms = self.analyzer.tokenize(text);
        if query_terms.is_empty() || doc_terms.is_empty() {
            return None;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for term in &doc_terms {
            *counts.entry(term.as_str()).or_insert(0) += 1;
        }

        let doc_len = doc_terms.len() as f32;
        let avg_len = self.avg_doc_len.max(1.0);
        let mut score = 0.0;
        let mut overlap = 0;
        for term in &query_terms {
            let tf = counts.get(term.as_str()).copied().unwrap_or(0) as f32;
            if tf == 0.0 {
                continue;
            }
            overlap += 1;
            let tf_component =
                (tf * (self.k1 + 1.0)) / (tf + self.k1 * (1.0 - self.b + self.b * doc_len / avg_len));
            score += self.idf(term) * tf_component;
        }

        (overlap > 0).then_some(Relevance { score, overlap })
    }
}
