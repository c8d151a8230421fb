//! Reciprocal Rank Fusion (RRF) over the ranked lists of both retrieval branches.
//!
//! `score(d) = Σ 1 / (k + rank_r(d))` over every list `r` that contains `d`.
//! Works on ranks only, so vector similarities and lexical scores never have
//! to be calibrated against each other.

use std::collections::{HashMap, HashSet};

use crate::record::{ChunkId, ContributingRanks, FusedCandidate, HitSource, RetrievalHit, StoreHit};

/// Turns store hits (best first) into 1-based ranked hits.
pub fn to_ranked(hits: &[StoreHit], source: HitSource) -> Vec<RetrievalHit> {
    hits.iter()
        .enumerate()
        .map(|(i, h)| RetrievalHit {
            chunk_id: h.chunk_id.clone(),
            raw_score: h.score,
            rank: i + 1,
            source,
        })
        .collect()
}

/// Fuses `lists` into one ranking.
///
/// The rank of a hit is its 1-based position in its list; a chunk repeated
/// inside the same list only counts at its first position. Ties are broken by
/// ascending [`ChunkId`], so the output is a pure function of the input.
pub fn reciprocal_rank_fusion(lists: &[Vec<RetrievalHit>], k: u32) -> Vec<FusedCandidate> {
    let k = f64::from(k);
    let mut acc: HashMap<&ChunkId, (f64, ContributingRanks)> = HashMap::new();

    for list in lists {
        let mut seen: HashSet<&ChunkId> = HashSet::with_capacity(list.len());
        for (pos, hit) in list.iter().enumerate() {
            if !seen.insert(&hit.chunk_id) {
                continue;
            }
            let rank = pos + 1;
            let entry = acc.entry(&hit.chunk_id).or_default();
            entry.0 += 1.0 / (k + rank as f64);
            entry.1.set(hit.source, rank);
        }
    }

    let mut out: Vec<FusedCandidate> = acc
        .into_iter()
        .map(|(id, (score, ranks))| FusedCandidate {
            chunk_id: id.clone(),
            fusion_score: score,
            contributing_ranks: ranks,
        })
        .collect();
    out.sort_by(|a, b| {
        b.fusion_score
            .total_cmp(&a.fusion_score)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    out
}
