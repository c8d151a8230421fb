//! Incremental change detection between freshly produced chunks and the
//! records already stored for the same document.
//!
//! Only content fingerprints participate in the comparison, so running the
//! classification twice on the same inputs always gives the same answer.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::record::{Chunk, ChunkId, StoredRecord};

/// Classification of one chunk position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeClass {
    New,
    Changed,
    Unchanged,
    Deleted,
}

/// Disjoint work sets for one document, each sorted by chunk index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Positions of New ∪ Changed chunks in the input slice.
    pub to_embed: Vec<usize>,
    /// Stored ids at Deleted positions.
    pub to_delete: Vec<ChunkId>,
    /// Unchanged ids; nothing is done with them.
    pub to_keep: Vec<ChunkId>,
    /// Class of every position, new and prior, in index order.
    pub classes: Vec<(ChunkId, ChangeClass)>,
}

impl ChangeSet {
    pub fn count(&self, class: ChangeClass) -> usize {
        self.classes.iter().filter(|(_, c)| *c == class).count()
    }
}

/// Classifies `new_chunks` of one document against its `prior` records.
///
/// Positions are matched by chunk index. Repeated priors for the same index
/// (a store returning the same point twice) are compared once. With
/// `force_reembed`, every Unchanged position becomes Changed.
pub fn classify_changes(
    new_chunks: &[Chunk],
    prior: &[StoredRecord],
    force_reembed: bool,
) -> ChangeSet {
    let mut sorted: Vec<&StoredRecord> = prior.iter().collect();
    sorted.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));

    let mut by_index: BTreeMap<u32, &StoredRecord> = BTreeMap::new();
    let mut duplicates = 0usize;
    for rec in sorted {
        if by_index.contains_key(&rec.chunk_id.index) {
            duplicates += 1;
        } else {
            by_index.insert(rec.chunk_id.index, rec);
        }
    }

    let mut out = ChangeSet::default();
    let mut positions: Vec<usize> = (0..new_chunks.len()).collect();
    positions.sort_by_key(|&i| new_chunks[i].id.index);

    for i in positions {
        let chunk = &new_chunks[i];
        let class = match by_index.remove(&chunk.id.index) {
            None => ChangeClass::New,
            Some(p) if p.fingerprint != chunk.fingerprint => ChangeClass::Changed,
            Some(_) if force_reembed => ChangeClass::Changed,
            Some(_) => ChangeClass::Unchanged,
        };
        match class {
            ChangeClass::Unchanged => out.to_keep.push(chunk.id.clone()),
            _ => out.to_embed.push(i),
        }
        out.classes.push((chunk.id.clone(), class));
    }

    for (_, rec) in by_index {
        out.to_delete.push(rec.chunk_id.clone());
        out.classes.push((rec.chunk_id.clone(), ChangeClass::Deleted));
    }
    out.to_delete.sort();
    out.classes.sort_by(|a, b| a.0.cmp(&b.0));

    debug!(
        "change::classify_changes new={} changed={} unchanged={} deleted={} duplicates={}",
        out.count(ChangeClass::New),
        out.count(ChangeClass::Changed),
        out.count(ChangeClass::Unchanged),
        out.count(ChangeClass::Deleted),
        duplicates
    );
    out
}
