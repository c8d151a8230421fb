//! Incremental indexing: chunk → diff against stored records → embed the
//! changed chunks → upsert → delete positions that disappeared.
//!
//! Per-chunk and per-document failures are collected into the returned
//! [`IndexSummary`]; only configuration problems abort the run.

use std::collections::HashMap;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::change::{ChangeClass, ChangeSet, classify_changes};
use crate::chunking::chunk_document;
use crate::config::RagConfig;
use crate::embed_pool::embed_chunks;
use crate::errors::{ProviderError, RagError, default_classify};
use crate::provider::{EmbeddingsProvider, SearchStore};
use crate::record::{Chunk, ChunkId, FailedItem, IndexSummary, IndexedChunk, SourceDocument};
use crate::throttle::Throttle;

/// Options of one indexing run.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct IndexOptions {
    /// Re-embed chunks even when their fingerprint is unchanged
    /// (e.g. after switching embedding models).
    #[serde(default)]
    pub force_reembed: bool,
    /// Draw a terminal progress bar over the embedding stage.
    #[serde(default)]
    pub show_progress: bool,
}

/// Work planned for one document.
struct DocPlan<'d> {
    doc: &'d SourceDocument,
    chunks: Vec<Chunk>,
    changes: ChangeSet,
}

/// Runs one indexing pass over `docs`.
///
/// Documents sharing an id are collapsed to the last occurrence.
///
/// # Errors
/// [`RagError::Config`] when the chunking limits are invalid.
pub async fn index_documents(
    cfg: &RagConfig,
    store: &dyn SearchStore,
    embedder: &dyn EmbeddingsProvider,
    throttle: &Throttle,
    docs: &[SourceDocument],
    opts: IndexOptions,
) -> Result<IndexSummary, RagError> {
    let docs = last_occurrence(docs);
    info!(
        "ingest::index_documents documents={} force_reembed={}",
        docs.len(),
        opts.force_reembed
    );

    let mut summary = IndexSummary {
        documents: docs.len(),
        ..Default::default()
    };

    /* ---- 1) chunk + diff ---- */
    let mut plans: Vec<DocPlan<'_>> = Vec::with_capacity(docs.len());
    for doc in docs {
        let chunks = chunk_document(doc, &cfg.chunking)?;
        summary.chunks += chunks.len();

        let prior = match store.get(&doc.id).await {
            Ok(p) => p,
            Err(e) => {
                warn!("ingest::index_documents prior state of '{}' unavailable: {e}", doc.id);
                summary.failed.extend(fail_all(chunks.iter().map(|c| &c.id), &e));
                continue;
            }
        };
        let changes = classify_changes(&chunks, &prior, opts.force_reembed);
        summary.unchanged += changes.count(ChangeClass::Unchanged);
        plans.push(DocPlan { doc, chunks, changes });
    }

    /* ---- 2) embed everything pending, across documents ---- */
    let pending: Vec<&Chunk> = plans
        .iter()
        .flat_map(|p| p.changes.to_embed.iter().map(|&i| &p.chunks[i]))
        .collect();

    let pb = opts.show_progress.then(|| progress_bar(pending.len()));
    let embedded = embed_chunks(
        &pending,
        embedder,
        &cfg.embedding,
        throttle,
        cfg.embedding_dim,
        pb.as_ref(),
    )
    .await;
    if let Some(pb) = &pb {
        pb.finish_with_message("embedding complete");
    }
    summary.failed.extend(embedded.failed);

    let mut records: HashMap<ChunkId, _> = embedded
        .records
        .into_iter()
        .map(|r| (r.chunk_id().clone(), r))
        .collect();

    /* ---- 3) per document: upsert, then delete vanished positions ---- */
    for plan in &plans {
        let batch: Vec<IndexedChunk> = plan
            .changes
            .to_embed
            .iter()
            .map(|&i| &plan.chunks[i])
            .filter_map(|c| records.remove(&c.id).map(|r| IndexedChunk::new(plan.doc, c, r)))
            .collect();
        let ids: Vec<ChunkId> = batch.iter().map(|c| c.chunk_id().clone()).collect();

        if !batch.is_empty() {
            if let Err(e) = store.upsert(batch).await {
                warn!("ingest::index_documents upsert of '{}' failed: {e}", plan.doc.id);
                summary.failed.extend(fail_all(ids.iter(), &e));
                // Keep the old points; deleting now would lose the document.
                continue;
            }
            summary.embedded += ids.len();
        }

        let to_delete = &plan.changes.to_delete;
        if !to_delete.is_empty() {
            match store.delete(to_delete).await {
                Ok(()) => summary.deleted += to_delete.len(),
                Err(e) => {
                    warn!("ingest::index_documents delete in '{}' failed: {e}", plan.doc.id);
                    summary.failed.extend(fail_all(to_delete.iter(), &e));
                }
            }
        }
        debug!(
            "ingest::index_documents '{}' upserted={} deleted={}",
            plan.doc.id,
            ids.len(),
            to_delete.len()
        );
    }

    summary.failed.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
    info!(
        "ingest::index_documents done chunks={} embedded={} unchanged={} deleted={} failed={}",
        summary.chunks,
        summary.embedded,
        summary.unchanged,
        summary.deleted,
        summary.failed.len()
    );
    Ok(summary)
}

/// Deletes every stored chunk of `document_id`; returns how many were removed.
///
/// # Errors
/// [`RagError::Store`] when the store cannot list or delete the chunks.
pub async fn remove_document(store: &dyn SearchStore, document_id: &str) -> Result<usize, RagError> {
    let prior = store
        .get(document_id)
        .await
        .map_err(|e| RagError::Store(format!("get '{document_id}': {e}")))?;
    let mut ids: Vec<ChunkId> = prior.into_iter().map(|r| r.chunk_id).collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        debug!("ingest::remove_document '{document_id}' has no stored chunks");
        return Ok(0);
    }
    store
        .delete(&ids)
        .await
        .map_err(|e| RagError::Store(format!("delete '{document_id}': {e}")))?;
    info!("ingest::remove_document '{document_id}' removed={}", ids.len());
    Ok(ids.len())
}

/* ------------------------------ helpers ------------------------------ */

fn last_occurrence(docs: &[SourceDocument]) -> Vec<&SourceDocument> {
    let mut last: HashMap<&str, usize> = HashMap::with_capacity(docs.len());
    for (i, d) in docs.iter().enumerate() {
        if last.insert(d.id.as_str(), i).is_some() {
            warn!("ingest::index_documents duplicate document id '{}', keeping the last", d.id);
        }
    }
    docs.iter()
        .enumerate()
        .filter(|(i, d)| last.get(d.id.as_str()) == Some(i))
        .map(|(_, d)| d)
        .collect()
}

fn fail_all<'a>(ids: impl Iterator<Item = &'a ChunkId>, err: &ProviderError) -> Vec<FailedItem> {
    let class = default_classify(err);
    let reason = err.to_string();
    ids.map(|id| FailedItem {
        chunk_id: id.clone(),
        reason: reason.clone(),
        class,
    })
    .collect()
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} chunks ({eta})",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}
