//! Embedding executor: token-aware batching, bounded concurrency, retries and
//! per-vector dimension checks.
//!
//! A failing batch never aborts the run; its chunks are reported as
//! [`FailedItem`]s and the remaining batches continue.

use std::ops::Range;

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use tracing::{debug, info, trace, warn};

use crate::config::EmbedConfig;
use crate::errors::{FailureClass, ProviderError};
use crate::provider::EmbeddingsProvider;
use crate::record::{Chunk, EmbeddingRecord, FailedItem};
use crate::retry::{RetryPolicy, retry_with_policy};
use crate::throttle::Throttle;

/// Records produced by one embedding run plus everything that failed.
#[derive(Debug, Default)]
pub struct EmbedOutcome {
    /// Sorted by chunk id.
    pub records: Vec<EmbeddingRecord>,
    pub failed: Vec<FailedItem>,
}

/// Splits `token_counts` into contiguous batches.
///
/// A batch closes when adding the next chunk would exceed either limit. A
/// single chunk larger than `max_tokens` still gets a batch of its own.
pub fn plan_batches(token_counts: &[usize], max_chunks: usize, max_tokens: usize) -> Vec<Range<usize>> {
    let max_chunks = max_chunks.max(1);
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut tokens = 0usize;

    for (i, &n) in token_counts.iter().enumerate() {
        let len = i - start;
        if len > 0 && (len >= max_chunks || tokens + n > max_tokens) {
            out.push(start..i);
            start = i;
            tokens = 0;
        }
        tokens += n;
    }
    if start < token_counts.len() {
        out.push(start..token_counts.len());
    }
    out
}

/// Embeds `chunks` and validates every returned vector against `expected_dim`.
///
/// Every request attempt goes through `throttle` and is bounded by
/// `cfg.request_timeout`; transient failures are retried per `cfg`.
pub async fn embed_chunks(
    chunks: &[&Chunk],
    provider: &dyn EmbeddingsProvider,
    cfg: &EmbedConfig,
    throttle: &Throttle,
    expected_dim: usize,
    progress: Option<&ProgressBar>,
) -> EmbedOutcome {
    if chunks.is_empty() {
        debug!("embed_pool::embed_chunks nothing to embed");
        return EmbedOutcome::default();
    }

    let counts: Vec<usize> = chunks.iter().map(|c| c.token_count).collect();
    let batches = plan_batches(&counts, cfg.max_batch_chunks, cfg.max_batch_tokens);
    let policy = RetryPolicy::from_config(cfg);
    info!(
        "embed_pool::embed_chunks chunks={} batches={} parallelism={}",
        chunks.len(),
        batches.len(),
        cfg.parallelism
    );

    let parts: Vec<EmbedOutcome> = stream::iter(batches)
        .map(|range| {
            let batch = &chunks[range];
            let policy = &policy;
            async move {
                let out = run_batch(batch, provider, cfg, throttle, policy, expected_dim).await;
                if let Some(pb) = progress {
                    pb.inc(batch.len() as u64);
                }
                out
            }
        })
        .buffer_unordered(cfg.parallelism.max(1))
        .collect()
        .await;

    let mut out = EmbedOutcome::default();
    for part in parts {
        out.records.extend(part.records);
        out.failed.extend(part.failed);
    }
    out.records.sort_by(|a, b| a.chunk_id().cmp(b.chunk_id()));
    out.failed.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));

    debug!(
        "embed_pool::embed_chunks embedded={} failed={}",
        out.records.len(),
        out.failed.len()
    );
    out
}

async fn run_batch(
    batch: &[&Chunk],
    provider: &dyn EmbeddingsProvider,
    cfg: &EmbedConfig,
    throttle: &Throttle,
    policy: &RetryPolicy,
    expected_dim: usize,
) -> EmbedOutcome {
    let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
    let first = &batch[0].id;
    let label = format!("embed_batch[{first} +{}]", batch.len());

    let result = retry_with_policy(policy, &label, |attempt| {
        let texts = &texts;
        async move {
            let _permit = throttle.acquire().await?;
            trace!("embed_pool::run_batch attempt={attempt} size={}", texts.len());
            let vectors =
                match tokio::time::timeout(cfg.request_timeout, provider.embed_batch(texts)).await {
                    Ok(r) => r?,
                    Err(_) => return Err(ProviderError::Timeout(cfg.request_timeout)),
                };
            if vectors.len() != texts.len() {
                return Err(ProviderError::Decode(format!(
                    "expected {} vectors, got {}",
                    texts.len(),
                    vectors.len()
                )));
            }
            Ok(vectors)
        }
    })
    .await;

    let mut out = EmbedOutcome::default();
    match result {
        Ok(vectors) => {
            for (chunk, vector) in batch.iter().zip(vectors) {
                match EmbeddingRecord::new(
                    chunk.id.clone(),
                    vector,
                    expected_dim,
                    provider.model(),
                    chunk.fingerprint.clone(),
                ) {
                    Ok(rec) => out.records.push(rec),
                    Err(e) => {
                        warn!("embed_pool::run_batch {}: {e}", chunk.id);
                        out.failed.push(FailedItem {
                            chunk_id: chunk.id.clone(),
                            reason: e.to_string(),
                            class: FailureClass::Permanent,
                        });
                    }
                }
            }
        }
        Err((err, class)) => {
            let reason = err.to_string();
            out.failed = batch
                .iter()
                .map(|c| FailedItem {
                    chunk_id: c.id.clone(),
                    reason: reason.clone(),
                    class,
                })
                .collect();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BoxFuture;
    use crate::record::{ChunkId, ContentType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Vectors of `dim` floats; input text drives misbehaviour:
    /// "short" gives a short vector, "drop" loses one vector from the batch,
    /// "flaky" fails the first call with a connection error.
    struct Scripted {
        dim: usize,
        calls: AtomicUsize,
    }

    impl EmbeddingsProvider for Scripted {
        fn embed_batch<'a>(
            &'a self,
            texts: &'a [String],
        ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, ProviderError>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 && texts.iter().any(|t| t.contains("flaky")) {
                    return Err(ProviderError::Connection("reset".into()));
                }
                let mut out: Vec<Vec<f32>> = texts
                    .iter()
                    .map(|t| {
                        let d = if t.contains("short") { self.dim - 1 } else { self.dim };
                        vec![0.5; d]
                    })
                    .collect();
                if texts.iter().any(|t| t.contains("drop")) {
                    out.pop();
                }
                Ok(out)
            })
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn chunk(i: u32, text: &str, tokens: usize) -> Chunk {
        Chunk {
            id: ChunkId::new("doc", i),
            text: text.to_string(),
            overlap_bytes: 0,
            token_count: tokens,
            section_title: None,
            section_level: None,
            has_code: false,
            is_continuation: false,
            content_type: ContentType::Text,
            fingerprint: format!("fp{i}"),
        }
    }

    fn cfg(max_chunks: usize) -> EmbedConfig {
        EmbedConfig {
            max_batch_chunks: max_chunks,
            max_batch_tokens: 10_000,
            parallelism: 2,
            min_request_interval: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            max_attempts: 3,
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(100),
        }
    }

    #[test]
    fn batches_by_count() {
        let sizes: Vec<usize> = plan_batches(&[1; 25], 8, 10_000)
            .iter()
            .map(|r| r.len())
            .collect();
        assert_eq!(sizes, vec![8, 8, 8, 1]);
    }

    #[test]
    fn batches_by_tokens_and_oversize_alone() {
        let b = plan_batches(&[40, 40, 40, 500, 10], 32, 100);
        assert_eq!(b, vec![0..2, 2..3, 3..4, 4..5]);
        assert!(plan_batches(&[], 8, 100).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dimension_mismatch_fails_single_chunk() {
        let chunks = [chunk(0, "ok", 1), chunk(1, "short one", 2), chunk(2, "ok too", 2)];
        let refs: Vec<&Chunk> = chunks.iter().collect();
        let p = Scripted {
            dim: 4,
            calls: AtomicUsize::new(0),
        };
        let th = Throttle::new(2, Duration::ZERO);
        let out = embed_chunks(&refs, &p, &cfg(8), &th, 4, None).await;
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.failed.len(), 1);
        assert_eq!(out.failed[0].chunk_id, ChunkId::new("doc", 1));
        assert_eq!(out.records[0].embedding_model(), "scripted");
    }

    #[tokio::test(start_paused = true)]
    async fn count_mismatch_fails_batch_and_run_continues() {
        let chunks = [
            chunk(0, "a", 1),
            chunk(1, "drop", 1),
            chunk(2, "c", 1),
            chunk(3, "d", 1),
        ];
        let refs: Vec<&Chunk> = chunks.iter().collect();
        let p = Scripted {
            dim: 3,
            calls: AtomicUsize::new(0),
        };
        let th = Throttle::new(2, Duration::ZERO);
        let out = embed_chunks(&refs, &p, &cfg(2), &th, 3, None).await;

        let failed: Vec<u32> = out.failed.iter().map(|f| f.chunk_id.index).collect();
        assert_eq!(failed, vec![0, 1]);
        assert!(out.failed.iter().all(|f| f.class == FailureClass::Permanent));
        let ok: Vec<u32> = out.records.iter().map(|r| r.chunk_id().index).collect();
        assert_eq!(ok, vec![2, 3]);
        // permanent: the broken batch is not retried
        assert_eq!(p.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried() {
        let chunks = [chunk(0, "flaky", 1)];
        let refs: Vec<&Chunk> = chunks.iter().collect();
        let p = Scripted {
            dim: 3,
            calls: AtomicUsize::new(0),
        };
        let th = Throttle::new(1, Duration::from_millis(50));
        let out = embed_chunks(&refs, &p, &cfg(8), &th, 3, None).await;
        assert_eq!(out.records.len(), 1);
        assert!(out.failed.is_empty());
        assert_eq!(p.calls.load(Ordering::SeqCst), 2);
    }
}
