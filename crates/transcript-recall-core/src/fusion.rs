//! Reciprocal Rank Fusion: `score(d) = Σ 1 / (k + rank_i(d))`.
//!
//! Merges independently ranked lists whose raw scores live on different
//! scales (BM25, cosine distance) using only each item's 1-based rank.
//!
//! # Tie-break
//!
//! Items with exactly equal fused scores keep the order in which they were
//! first seen during accumulation: lists in input order, each list from
//! rank 1 down. The first occurrence of an id also supplies its payload.

use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{FusedHit, RankedHit};

/// Smoothing constant from Cormack et al. (SIGIR 2009).
pub const DEFAULT_RRF_K: u32 = 60;

struct Accumulated<T> {
    item: T,
    score: f64,
    first_seen: usize,
}

/// Fuse ranked lists of arbitrary items identified by `key`.
///
/// Returns every distinct item once, with its fused score, sorted by score
/// descending and then by first-seen order.
pub fn reciprocal_rank_fusion<T, K, F>(lists: &[Vec<T>], k: u32, key: F) -> Vec<(T, f64)>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let k = k as f64;
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut acc: Vec<Accumulated<T>> = Vec::new();

    for list in lists {
        for (idx, item) in list.iter().enumerate() {
            let contribution = 1.0 / (k + (idx + 1) as f64);
            let slot = *slots.entry(key(item)).or_insert_with(|| {
                acc.push(Accumulated {
                    item: item.clone(),
                    score: 0.0,
                    first_seen: acc.len(),
                });
                acc.len() - 1
            });
            acc[slot].score += contribution;
        }
    }

    acc.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.first_seen.cmp(&b.first_seen))
    });

    acc.into_iter().map(|a| (a.item, a.score)).collect()
}

/// Fuse lexical and vector result lists into one ranking of unique messages.
pub fn fuse(lists: &[Vec<RankedHit>], k: u32) -> Vec<FusedHit> {
    reciprocal_rank_fusion(lists, k, |hit| hit.message.id.clone())
        .into_iter()
        .map(|(hit, rrf_score)| FusedHit {
            message: hit.message,
            rrf_score,
        })
        .collect()
}
