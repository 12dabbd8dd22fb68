//! Hybrid Search Merger
//!
//! Weighted Reciprocal Rank Fusion of a vector ranking and a lexical ranking:
//!
//! ```text
//! score(doc) = vector_weight / (k + vector_rank) + lexical_weight / (k + lexical_rank)
//! ```
//!
//! Ranks are 1-based; a document missing from one ranking gets no
//! contribution from it. Each document appears once. Equal scores are
//! ordered by vector rank, then lexical rank (absent ranks last), then key.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::iter::FusedIterator;

use crate::config::HybridConfig;

/// One fused result.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridHit<T> {
    /// Document storage key
    pub key: String,
    /// Fused score
    pub score: f32,
    /// 1-based rank in the vector ranking
    pub vector_rank: Option<usize>,
    /// 1-based rank in the lexical ranking
    pub lexical_rank: Option<usize>,
    /// Payload from the first ranking the document appeared in
    pub item: T,
}

struct Pending<T> {
    vector: Vec<(String, T)>,
    lexical: Vec<(String, T)>,
    config: HybridConfig,
}

/// Lazy fused ranking.
///
/// Nothing is computed until the first call to `next`. The iterator is
/// finite (at most `limit` hits) and cannot be restarted.
pub struct HybridMerge<T> {
    pending: Option<Pending<T>>,
    ranked: std::vec::IntoIter<HybridHit<T>>,
    limit: usize,
}

/// Fuse two best-first rankings.
pub fn merge<T>(
    vector: Vec<(String, T)>,
    lexical: Vec<(String, T)>,
    limit: usize,
    config: &HybridConfig,
) -> HybridMerge<T> {
    HybridMerge {
        pending: Some(Pending {
            vector,
            lexical,
            config: config.clone(),
        }),
        ranked: Vec::new().into_iter(),
        limit,
    }
}

fn rank_order(a: Option<usize>, b: Option<usize>) -> Ordering {
    a.unwrap_or(usize::MAX).cmp(&b.unwrap_or(usize::MAX))
}

impl<T> Pending<T> {
    fn fuse(self, limit: usize) -> Vec<HybridHit<T>> {
        let k = self.config.rrf_k;
        let mut hits: Vec<HybridHit<T>> = Vec::with_capacity(self.vector.len() + self.lexical.len());
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (index, (key, item)) in self.vector.into_iter().enumerate() {
            if positions.contains_key(&key) {
                continue;
            }
            let rank = index + 1;
            positions.insert(key.clone(), hits.len());
            hits.push(HybridHit {
                key,
                score: self.config.vector_weight / (k + rank as f32),
                vector_rank: Some(rank),
                lexical_rank: None,
                item,
            });
        }
        for (index, (key, item)) in self.lexical.into_iter().enumerate() {
            let rank = index + 1;
            let contribution = self.config.lexical_weight / (k + rank as f32);
            match positions.get(&key) {
                Some(&at) => {
                    let hit = &mut hits[at];
                    if hit.lexical_rank.is_none() {
                        hit.lexical_rank = Some(rank);
                        hit.score += contribution;
                    }
                }
                None => {
                    positions.insert(key.clone(), hits.len());
                    hits.push(HybridHit {
                        key,
                        score: contribution,
                        vector_rank: None,
                        lexical_rank: Some(rank),
                        item,
                    });
                }
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| rank_order(a.vector_rank, b.vector_rank))
                .then_with(|| rank_order(a.lexical_rank, b.lexical_rank))
                .then_with(|| a.key.cmp(&b.key))
        });
        hits.truncate(limit);
        hits
    }
}

impl<T> Iterator for HybridMerge<T> {
    type Item = HybridHit<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(pending) = self.pending.take() {
            self.ranked = pending.fuse(self.limit).into_iter();
        }
        self.ranked.next()
    }
}

impl<T> FusedIterator for HybridMerge<T> {}
