//! Candidate selection with Maximal Marginal Relevance (MMR).

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::record::{ChunkId, FusedCandidate};

/// A candidate picked by [`mmr_select`].
#[derive(Clone, Debug, PartialEq)]
pub struct Selected {
    pub candidate: FusedCandidate,
    /// Position in the fused ranking (0-based).
    pub fused_rank: usize,
}

/// Greedy MMR over the first `fetch_k` fused candidates.
///
/// At each step the candidate maximizing `λ·rel − (1−λ)·max_sim` is picked,
/// where `rel` is the fusion score normalized by the best score in the window
/// and `max_sim` the cosine similarity to the closest already picked
/// candidate. Candidates without a vector have zero similarity to everything.
/// Ties go to the earlier fused rank, so `lambda = 1.0` reproduces the fused
/// order.
pub fn mmr_select(
    candidates: &[FusedCandidate],
    vectors: &HashMap<ChunkId, Vec<f32>>,
    target: usize,
    fetch_k: usize,
    lambda: f32,
) -> Vec<Selected> {
    let window = &candidates[..fetch_k.min(candidates.len())];
    let n = target.min(window.len());
    if n == 0 {
        return Vec::new();
    }

    let max_score = window
        .iter()
        .map(|c| c.fusion_score)
        .fold(0.0f64, f64::max);
    let relevance: Vec<f32> = window
        .iter()
        .map(|c| {
            if max_score > 0.0 {
                (c.fusion_score / max_score) as f32
            } else {
                0.0
            }
        })
        .collect();
    let vecs: Vec<Option<&[f32]>> = window
        .iter()
        .map(|c| vectors.get(&c.chunk_id).map(Vec::as_slice))
        .collect();

    let mut picked: Vec<usize> = Vec::with_capacity(n);
    let mut taken: HashSet<&ChunkId> = HashSet::with_capacity(n);
    // Running max similarity of each candidate to the picked set; `None`
    // until something is picked, so negative similarities are kept.
    let mut max_sim: Vec<Option<f32>> = vec![None; window.len()];

    while picked.len() < n {
        let mut best: Option<(usize, f32)> = None;
        for (i, c) in window.iter().enumerate() {
            if taken.contains(&c.chunk_id) {
                continue;
            }
            let gain = lambda * relevance[i] - (1.0 - lambda) * max_sim[i].unwrap_or(0.0);
            if best.is_none_or(|(_, g)| gain > g) {
                best = Some((i, gain));
            }
        }
        let Some((pick, _)) = best else { break };

        picked.push(pick);
        taken.insert(&window[pick].chunk_id);
        for (i, v) in vecs.iter().enumerate() {
            let sim = match (vecs[pick], v) {
                (Some(pv), Some(v)) => cosine(pv, v),
                _ => 0.0,
            };
            max_sim[i] = Some(max_sim[i].map_or(sim, |m| m.max(sim)));
        }
    }

    debug!(
        "select::mmr_select window={} picked={} lambda={lambda}",
        window.len(),
        picked.len()
    );
    picked
        .into_iter()
        .map(|i| Selected {
            candidate: window[i].clone(),
            fused_rank: i,
        })
        .collect()
}

/// Cosine similarity; zero when either side has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    let len = a.len().min(b.len());
    for i in 0..len {
        dot += a[i] * b[i];
        na += a[i] * a[i];
        nb += b[i] * b[i];
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}
