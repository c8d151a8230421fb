//! Optional cross-encoder rerank of the selected candidates.
//!
//! The reranker never fails a query: an error, a timeout or a malformed
//! response leaves the prior order untouched.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::provider::RerankProvider;

/// Result of [`apply_rerank`].
#[derive(Clone, Debug, PartialEq)]
pub struct RerankOutcome {
    /// Permutation of the input positions, best first.
    pub order: Vec<usize>,
    /// Reranker score per input position; `None` when not scored.
    pub scores: Vec<Option<f32>>,
    /// True only when the reranker answered in time with a valid response.
    pub applied: bool,
}

impl RerankOutcome {
    fn passthrough(n: usize) -> Self {
        Self {
            order: (0..n).collect(),
            scores: vec![None; n],
            applied: false,
        }
    }
}

/// Reorders `texts` (given in prior order) by reranker score.
///
/// Scored candidates come first, by descending score with ties broken by
/// prior position; candidates the reranker omitted follow in prior order.
pub async fn apply_rerank(
    query: &str,
    texts: &[String],
    reranker: Option<&dyn RerankProvider>,
    timeout: Duration,
) -> RerankOutcome {
    let n = texts.len();
    let Some(reranker) = reranker else {
        return RerankOutcome::passthrough(n);
    };
    if n == 0 {
        return RerankOutcome::passthrough(0);
    }

    trace!("rerank::apply_rerank candidates={n}");
    let pairs = match tokio::time::timeout(timeout, reranker.rerank(query, texts)).await {
        Ok(Ok(p)) => p,
        Ok(Err(e)) => {
            warn!("rerank::apply_rerank provider failed, keeping prior order: {e}");
            return RerankOutcome::passthrough(n);
        }
        Err(_) => {
            warn!("rerank::apply_rerank timed out after {timeout:?}, keeping prior order");
            return RerankOutcome::passthrough(n);
        }
    };

    if let Err(reason) = validate(&pairs, n) {
        warn!("rerank::apply_rerank invalid response ({reason}), keeping prior order");
        return RerankOutcome::passthrough(n);
    }

    let mut scores = vec![None; n];
    for &(i, s) in &pairs {
        scores[i] = Some(s);
    }

    let mut scored: Vec<usize> = (0..n).filter(|&i| scores[i].is_some()).collect();
    scored.sort_by(|&a, &b| {
        let (sa, sb) = (scores[a].unwrap_or(f32::MIN), scores[b].unwrap_or(f32::MIN));
        sb.total_cmp(&sa).then(a.cmp(&b))
    });
    let omitted = (0..n).filter(|&i| scores[i].is_none());
    let order: Vec<usize> = scored.into_iter().chain(omitted).collect();

    debug!("rerank::apply_rerank applied scored={} total={n}", pairs.len());
    RerankOutcome {
        order,
        scores,
        applied: true,
    }
}

fn validate(pairs: &[(usize, f32)], n: usize) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(pairs.len());
    for &(i, s) in pairs {
        if i >= n {
            return Err(format!("index {i} out of range ({n} candidates)"));
        }
        if !seen.insert(i) {
            return Err(format!("duplicate index {i}"));
        }
        if !s.is_finite() {
            return Err(format!("non-finite score for index {i}"));
        }
    }
    Ok(())
}
